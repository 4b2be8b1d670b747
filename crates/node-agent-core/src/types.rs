//! Domain types for the reconciliation engine.
//!
//! Everything here is rebuilt from live cluster state on every tick and
//! dropped when the tick ends. No type in this module is persisted.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use crate::error::WatcherError;

/// Label carrying the node pool a node belongs to.
pub const NODE_POOL_LABEL_KEY: &str = "kubernetes.civo.com/civo-node-pool";

/// Extended resource name for allocatable GPUs.
pub const GPU_RESOURCE_NAME: &str = "nvidia.com/gpu";

/// Condition type that signals the kubelet is accepting workloads.
pub const READY_CONDITION: &str = "Ready";

// ── Node ──────────────────────────────────────────────────────────

/// Status value of a node condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    /// Parse the API string form. Anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a node's `status.conditions`, in reported order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCondition {
    /// Condition type, e.g. `Ready`, `MemoryPressure`.
    pub kind: String,
    pub status: ConditionStatus,
    /// When the condition last flipped. `None` if the API omitted it.
    pub last_transition_time: Option<SystemTime>,
}

impl NodeCondition {
    /// Shorthand for a `Ready` condition.
    pub fn ready(status: ConditionStatus, last_transition_time: SystemTime) -> Self {
        Self {
            kind: READY_CONDITION.to_string(),
            status,
            last_transition_time: Some(last_transition_time),
        }
    }

    pub fn is_ready_kind(&self) -> bool {
        self.kind == READY_CONDITION
    }
}

/// Immutable view of one cluster node at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeSnapshot {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Conditions as reported. Duplicates of the same kind are kept.
    pub conditions: Vec<NodeCondition>,
    /// Allocatable `nvidia.com/gpu`, 0 when absent or not an integer.
    pub allocatable_gpu: u64,
}

impl NodeSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: NodeCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_allocatable_gpu(mut self, count: u64) -> Self {
        self.allocatable_gpu = count;
        self
    }

    /// All `Ready` conditions, in reported order.
    pub fn ready_conditions(&self) -> impl Iterator<Item = &NodeCondition> {
        self.conditions.iter().filter(|c| c.is_ready_kind())
    }

    /// The first `Ready` condition reported, if any.
    pub fn first_ready_condition(&self) -> Option<&NodeCondition> {
        self.ready_conditions().next()
    }

    /// The most recent transition time across every `Ready` condition.
    pub fn latest_ready_transition(&self) -> Option<SystemTime> {
        self.ready_conditions()
            .filter_map(|c| c.last_transition_time)
            .max()
    }
}

// ── Selector ──────────────────────────────────────────────────────

/// Equality-based label selector identifying the target node pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Selector for the Civo node pool label.
    pub fn node_pool(pool_id: impl Into<String>) -> Self {
        Self::new(NODE_POOL_LABEL_KEY, pool_id)
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(&self.key).is_some_and(|v| *v == self.value)
    }
}

/// Renders as `key=value`, the form the Kubernetes list API accepts.
impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// Compute instance backing a node. The engine only reads `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub hostname: String,
}

// ── Verdicts ──────────────────────────────────────────────────────

/// Result of the composite health predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    Unhealthy,
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Why a node was left alone this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Healthy,
    /// Unhealthy, but its readiness changed inside the cooldown window.
    CoolingDown,
}

/// What happened to a single node during one tick.
#[derive(Debug)]
pub enum RemediationOutcome {
    Skipped(SkipReason),
    Succeeded { instance_id: String },
    Failed(WatcherError),
}

/// Summary of a tick that ran to completion.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Nodes returned by the node source.
    pub listed: usize,
    /// Per-node outcomes, in listing order.
    pub outcomes: Vec<(String, RemediationOutcome)>,
}

impl TickReport {
    /// Instance IDs a reboot was issued for.
    pub fn rebooted(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                RemediationOutcome::Succeeded { instance_id } => Some(instance_id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, RemediationOutcome::Skipped(r) if *r == reason))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn condition_status_parses_api_strings() {
        assert_eq!(ConditionStatus::parse("True"), ConditionStatus::True);
        assert_eq!(ConditionStatus::parse("False"), ConditionStatus::False);
        assert_eq!(ConditionStatus::parse("Unknown"), ConditionStatus::Unknown);
        assert_eq!(ConditionStatus::parse("true"), ConditionStatus::Unknown);
        assert_eq!(ConditionStatus::parse(""), ConditionStatus::Unknown);
    }

    #[test]
    fn first_ready_condition_uses_reported_order() {
        let node = NodeSnapshot::new("n1")
            .with_condition(NodeCondition {
                kind: "MemoryPressure".to_string(),
                status: ConditionStatus::False,
                last_transition_time: Some(at(50)),
            })
            .with_condition(NodeCondition::ready(ConditionStatus::False, at(100)))
            .with_condition(NodeCondition::ready(ConditionStatus::True, at(200)));

        let first = node.first_ready_condition().unwrap();
        assert_eq!(first.status, ConditionStatus::False);
        assert_eq!(node.ready_conditions().count(), 2);
    }

    #[test]
    fn latest_ready_transition_takes_maximum() {
        let node = NodeSnapshot::new("n1")
            .with_condition(NodeCondition::ready(ConditionStatus::True, at(300)))
            .with_condition(NodeCondition::ready(ConditionStatus::False, at(100)))
            .with_condition(NodeCondition {
                kind: "DiskPressure".to_string(),
                status: ConditionStatus::False,
                last_transition_time: Some(at(900)),
            });

        assert_eq!(node.latest_ready_transition(), Some(at(300)));
    }

    #[test]
    fn latest_ready_transition_ignores_missing_times() {
        let node = NodeSnapshot::new("n1").with_condition(NodeCondition {
            kind: READY_CONDITION.to_string(),
            status: ConditionStatus::False,
            last_transition_time: None,
        });
        assert_eq!(node.latest_ready_transition(), None);
        assert!(node.first_ready_condition().is_some());
    }

    #[test]
    fn selector_renders_and_matches() {
        let selector = LabelSelector::node_pool("pool-a");
        assert_eq!(
            selector.to_string(),
            "kubernetes.civo.com/civo-node-pool=pool-a"
        );

        let node = NodeSnapshot::new("n1").with_label(NODE_POOL_LABEL_KEY, "pool-a");
        assert!(selector.matches(&node.labels));

        let other = NodeSnapshot::new("n2").with_label(NODE_POOL_LABEL_KEY, "pool-b");
        assert!(!selector.matches(&other.labels));
        assert!(!selector.matches(&NodeSnapshot::new("n3").labels));
    }

    #[test]
    fn tick_report_summaries() {
        let report = TickReport {
            listed: 3,
            outcomes: vec![
                ("a".to_string(), RemediationOutcome::Skipped(SkipReason::Healthy)),
                ("b".to_string(), RemediationOutcome::Skipped(SkipReason::CoolingDown)),
                (
                    "c".to_string(),
                    RemediationOutcome::Succeeded {
                        instance_id: "inst-c".to_string(),
                    },
                ),
            ],
        };
        assert_eq!(report.rebooted(), vec!["inst-c"]);
        assert_eq!(report.skipped(SkipReason::Healthy), 1);
        assert_eq!(report.skipped(SkipReason::CoolingDown), 1);
    }
}
