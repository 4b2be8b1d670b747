//! Reconciler: one evaluation cycle over the node pool.
//!
//! Lists the pool, classifies every node, and reboots the backing
//! instance of each unhealthy node whose readiness has been stable for
//! longer than the cooldown window.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use tracing::{debug, error, info};

use node_agent_core::*;
use node_agent_health::{DebounceGuard, evaluate};

/// Runs reconciliation ticks against the configured pool.
///
/// Holds no state between ticks apart from configuration. At most one
/// tick runs at a time; an overlapping call is rejected with
/// [`WatcherError::TickInProgress`].
pub struct Reconciler {
    config: Arc<WatcherConfig>,
    nodes: Arc<dyn NodeSource>,
    instances: Arc<dyn InstanceRebooter>,
    guard: DebounceGuard,
    in_flight: AtomicBool,
}

impl Reconciler {
    pub fn new(
        config: Arc<WatcherConfig>,
        nodes: Arc<dyn NodeSource>,
        instances: Arc<dyn InstanceRebooter>,
    ) -> Self {
        let guard = DebounceGuard::from_config(&config);
        Self {
            config,
            nodes,
            instances,
            guard,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Run one tick using the current wall-clock time.
    pub async fn run_once(&self) -> WatcherResult<TickReport> {
        self.run_once_at(SystemTime::now()).await
    }

    /// Run one tick as if the current time were `now`.
    ///
    /// The cooldown threshold is computed once from `now` and applied to
    /// every node in the tick.
    pub async fn run_once_at(&self, now: SystemTime) -> WatcherResult<TickReport> {
        let _tick = InFlight::acquire(&self.in_flight).ok_or(WatcherError::TickInProgress)?;

        let selector = &self.config.node_pool_selector;
        let nodes = self
            .nodes
            .list_nodes(selector)
            .await
            .map_err(|source| WatcherError::Retrieval {
                selector: selector.to_string(),
                source,
            })?;
        debug!(%selector, count = nodes.len(), "listed pool nodes");

        let mut report = TickReport {
            listed: nodes.len(),
            outcomes: Vec::with_capacity(nodes.len()),
        };

        for node in &nodes {
            match self.reconcile_node(node, now).await {
                RemediationOutcome::Failed(err) => {
                    error!(node = %node.name, error = %err, "failed to reboot node");
                    return Err(err);
                }
                outcome => report.outcomes.push((node.name.clone(), outcome)),
            }
        }

        Ok(report)
    }

    async fn reconcile_node(&self, node: &NodeSnapshot, now: SystemTime) -> RemediationOutcome {
        if evaluate(node, self.config.desired_gpu_count).is_healthy() {
            return RemediationOutcome::Skipped(SkipReason::Healthy);
        }

        info!(node = %node.name, "node is not healthy, attempting to reboot");
        if self.guard.should_suppress(node, now) {
            info!(
                node = %node.name,
                cooldown_secs = self.guard.cooldown().as_secs(),
                "skipping reboot because Ready status changed recently"
            );
            return RemediationOutcome::Skipped(SkipReason::CoolingDown);
        }

        self.remediate(node).await
    }

    /// Locate the node's instance and hard-reboot it. No retries.
    pub async fn remediate(&self, node: &NodeSnapshot) -> RemediationOutcome {
        let cluster_id = &self.config.cluster_id;

        let instance = match self.instances.find_instance(cluster_id, &node.name).await {
            Ok(instance) => instance,
            Err(source) => {
                return RemediationOutcome::Failed(WatcherError::InstanceLookup {
                    cluster_id: cluster_id.clone(),
                    node_name: node.name.clone(),
                    source,
                });
            }
        };

        if let Err(source) = self.instances.hard_reboot(&instance.id).await {
            return RemediationOutcome::Failed(WatcherError::Remediation {
                cluster_id: cluster_id.clone(),
                instance_id: instance.id,
                source,
            });
        }

        info!(instance_id = %instance.id, node = %node.name, "instance is rebooting");
        RemediationOutcome::Succeeded {
            instance_id: instance.id,
        }
    }
}

/// Marks a tick as running for as long as it is alive.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
