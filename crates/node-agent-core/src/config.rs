//! Immutable engine configuration.
//!
//! `WatcherConfig` is resolved once at startup through
//! [`WatcherConfigBuilder`], validated eagerly, and then shared read-only
//! by the reconciler and scheduler.

use std::time::Duration;

use tracing::warn;

use crate::error::{WatcherError, WatcherResult};
use crate::types::LabelSelector;

/// Cooldown applied when none (or an invalid one) is supplied.
pub const DEFAULT_REBOOT_COOLDOWN: Duration = Duration::from_secs(40 * 60);

/// Period between reconciliation ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// What the debounce guard does when a node reports no readiness
/// transition at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingReadyPolicy {
    /// Do not suppress: there is nothing to debounce against.
    #[default]
    Remediate,
    /// Suppress until the node reports a readiness condition.
    Suppress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    pub cluster_id: String,
    pub node_pool_selector: LabelSelector,
    /// Exact allocatable GPU count every node must report. 0 disables the check.
    pub desired_gpu_count: u32,
    /// Minimum age of the last readiness transition before a reboot.
    pub reboot_cooldown: Duration,
    pub tick_interval: Duration,
    pub missing_ready_policy: MissingReadyPolicy,
}

impl WatcherConfig {
    pub fn builder(
        cluster_id: impl Into<String>,
        node_pool_id: impl Into<String>,
    ) -> WatcherConfigBuilder {
        WatcherConfigBuilder::new(cluster_id, node_pool_id)
    }
}

/// Accumulates configuration values, keeping defaults for anything
/// invalid, and validates required fields in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct WatcherConfigBuilder {
    cluster_id: String,
    node_pool_id: String,
    desired_gpu_count: u32,
    reboot_cooldown: Duration,
    tick_interval: Duration,
    missing_ready_policy: MissingReadyPolicy,
}

impl WatcherConfigBuilder {
    pub fn new(cluster_id: impl Into<String>, node_pool_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            node_pool_id: node_pool_id.into(),
            desired_gpu_count: 0,
            reboot_cooldown: DEFAULT_REBOOT_COOLDOWN,
            tick_interval: DEFAULT_TICK_INTERVAL,
            missing_ready_policy: MissingReadyPolicy::default(),
        }
    }

    pub fn desired_gpu_count(mut self, count: u32) -> Self {
        self.desired_gpu_count = count;
        self
    }

    /// Set the desired GPU count from its textual form. Unparsable or
    /// negative input is logged and ignored.
    pub fn desired_gpu_count_str(mut self, raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>().ok().and_then(|n| u32::try_from(n).ok()) {
            Some(count) => self.desired_gpu_count = count,
            None => warn!(
                value = %raw,
                current = self.desired_gpu_count,
                "invalid desired GPU count, keeping current value"
            ),
        }
        self
    }

    /// Set the reboot cooldown. A zero duration is ignored.
    pub fn reboot_cooldown(mut self, cooldown: Duration) -> Self {
        if cooldown.is_zero() {
            warn!(
                current_secs = self.reboot_cooldown.as_secs(),
                "reboot cooldown must be positive, keeping current value"
            );
        } else {
            self.reboot_cooldown = cooldown;
        }
        self
    }

    /// Set the reboot cooldown from a whole number of minutes in textual
    /// form. Unparsable or non-positive input is logged and ignored.
    pub fn reboot_cooldown_minutes_str(self, raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>().ok().and_then(|n| u64::try_from(n).ok()) {
            Some(minutes) if minutes > 0 => {
                let minutes = minutes.min(u64::MAX / 60);
                self.reboot_cooldown(Duration::from_secs(minutes * 60))
            }
            _ => {
                warn!(
                    value = %raw,
                    current_secs = self.reboot_cooldown.as_secs(),
                    "invalid reboot time window, keeping current value"
                );
                self
            }
        }
    }

    /// Set the tick period. A zero duration is ignored.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!("tick interval must be positive, keeping current value");
        } else {
            self.tick_interval = interval;
        }
        self
    }

    pub fn missing_ready_policy(mut self, policy: MissingReadyPolicy) -> Self {
        self.missing_ready_policy = policy;
        self
    }

    /// Validate required fields and freeze the configuration.
    pub fn build(self) -> WatcherResult<WatcherConfig> {
        let cluster_id = self.cluster_id.trim();
        if cluster_id.is_empty() {
            return Err(WatcherError::Config("cluster ID is not set".to_string()));
        }
        let node_pool_id = self.node_pool_id.trim();
        if node_pool_id.is_empty() {
            return Err(WatcherError::Config("node pool ID is not set".to_string()));
        }

        Ok(WatcherConfig {
            cluster_id: cluster_id.to_string(),
            node_pool_selector: LabelSelector::node_pool(node_pool_id),
            desired_gpu_count: self.desired_gpu_count,
            reboot_cooldown: self.reboot_cooldown,
            tick_interval: self.tick_interval,
            missing_ready_policy: self.missing_ready_policy,
        })
    }
}
