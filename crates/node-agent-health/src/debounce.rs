//! Reboot debounce guard.
//!
//! Readiness flaps during normal churn (a node that just joined, a
//! kubelet restart). Rebooting a node whose `Ready` condition changed
//! inside the cooldown window risks reboot-looping a node mid-recovery,
//! so such nodes are skipped until the window has passed.

use std::time::{Duration, SystemTime};

use tracing::{debug, error};

use node_agent_core::{MissingReadyPolicy, NodeSnapshot, WatcherConfig};

/// Cooldown check with an explicit policy for nodes that report no
/// readiness transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceGuard {
    cooldown: Duration,
    missing_ready_policy: MissingReadyPolicy,
}

impl DebounceGuard {
    pub fn new(cooldown: Duration, missing_ready_policy: MissingReadyPolicy) -> Self {
        Self {
            cooldown,
            missing_ready_policy,
        }
    }

    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(config.reboot_cooldown, config.missing_ready_policy)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether remediation of `node` should be held back at `now`.
    ///
    /// Uses the latest transition time across every `Ready` condition the
    /// node reports.
    pub fn should_suppress(&self, node: &NodeSnapshot, now: SystemTime) -> bool {
        let threshold = now
            .checked_sub(self.cooldown)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let Some(last_transition) = node.latest_ready_transition() else {
            error!(
                node = %node.name,
                policy = ?self.missing_ready_policy,
                "node is in an invalid state, Ready condition transition not found"
            );
            return self.missing_ready_policy == MissingReadyPolicy::Suppress;
        };

        let recent = last_transition > threshold;
        debug!(
            node = %node.name,
            last_transition_age_secs = age_secs(now, last_transition),
            cooldown_secs = self.cooldown.as_secs(),
            suppress = recent,
            "checked Ready condition transition against cooldown"
        );
        recent
    }
}

/// Debounce with the default policy: a node with no readiness
/// transition is not suppressed.
pub fn should_suppress(node: &NodeSnapshot, cooldown: Duration, now: SystemTime) -> bool {
    DebounceGuard::new(cooldown, MissingReadyPolicy::Remediate).should_suppress(node, now)
}

/// Seconds between `then` and `now`, negative if `then` is in the future.
fn age_secs(now: SystemTime, then: SystemTime) -> i64 {
    match now.duration_since(then) {
        Ok(age) => i64::try_from(age.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}
