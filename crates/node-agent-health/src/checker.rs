//! Composite node health predicate.
//!
//! A node is healthy only when it is Ready and, if a desired GPU count is
//! configured, reports exactly that many allocatable GPUs.

use tracing::debug;

use node_agent_core::{ConditionStatus, HealthVerdict, NodeSnapshot, READY_CONDITION};

/// Evaluate a node against both health checks.
pub fn evaluate(node: &NodeSnapshot, desired_gpu_count: u32) -> HealthVerdict {
    // Both checks always run so their diagnostics are emitted together.
    let gpu_ok = has_desired_gpu_count(node, desired_gpu_count);
    let ready = is_node_ready(node);

    if gpu_ok && ready {
        HealthVerdict::Healthy
    } else {
        HealthVerdict::Unhealthy
    }
}

/// Whether the node's first reported `Ready` condition is `True`.
///
/// Later duplicates of the condition are ignored, whatever their
/// transition time.
pub fn is_node_ready(node: &NodeSnapshot) -> bool {
    match node.first_ready_condition() {
        Some(cond) => {
            debug!(
                node = %node.name,
                condition = READY_CONDITION,
                status = %cond.status,
                "current node status"
            );
            cond.status == ConditionStatus::True
        }
        None => {
            debug!(node = %node.name, "Ready condition not found");
            false
        }
    }
}

/// Whether the node reports exactly `desired` allocatable GPUs.
///
/// A `desired` of 0 disables the check. A missing or zero allocatable
/// count never matches.
pub fn has_desired_gpu_count(node: &NodeSnapshot, desired: u32) -> bool {
    if desired == 0 {
        debug!(node = %node.name, "desired GPU count is 0, skipping GPU check");
        return true;
    }

    if node.allocatable_gpu == 0 {
        debug!(node = %node.name, "allocatable GPU not found");
        return false;
    }

    debug!(
        node = %node.name,
        actual = node.allocatable_gpu,
        desired,
        "checking allocatable GPU count"
    );
    node.allocatable_gpu == u64::from(desired)
}
