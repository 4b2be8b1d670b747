//! Pool listing through the Kubernetes API.

use std::time::SystemTime;

use k8s_openapi::api::core::v1::{Node, NodeCondition as KubeNodeCondition};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::{debug, warn};

use node_agent_core::*;

use crate::client::KubeSourceError;

/// Lists cluster-scoped `Node` objects matching the pool selector.
#[derive(Clone)]
pub struct KubeNodeSource {
    api: Api<Node>,
}

impl KubeNodeSource {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

impl NodeSource for KubeNodeSource {
    fn list_nodes<'a>(
        &'a self,
        selector: &'a LabelSelector,
    ) -> BoxFuture<'a, anyhow::Result<Vec<NodeSnapshot>>> {
        Box::pin(async move {
            let params = ListParams::default().labels(&selector.to_string());
            let list = self
                .api
                .list(&params)
                .await
                .map_err(KubeSourceError::List)?;

            debug!(%selector, count = list.items.len(), "listed nodes from API server");
            Ok::<_, anyhow::Error>(list.items.iter().map(snapshot_from_node).collect())
        })
    }
}

/// Convert an API `Node` into the engine's snapshot.
///
/// Missing metadata or status fields become empty values; conditions
/// keep their reported order, duplicates included.
pub fn snapshot_from_node(node: &Node) -> NodeSnapshot {
    let name = node.metadata.name.clone().unwrap_or_default();
    let labels = node.metadata.labels.clone().unwrap_or_default();
    let status = node.status.as_ref();

    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| conditions.iter().map(convert_condition).collect())
        .unwrap_or_default();

    let allocatable_gpu = status
        .and_then(|s| s.allocatable.as_ref())
        .and_then(|allocatable| allocatable.get(GPU_RESOURCE_NAME))
        .map(|quantity| gpu_count(&name, quantity))
        .unwrap_or(0);

    NodeSnapshot {
        name,
        labels,
        conditions,
        allocatable_gpu,
    }
}

fn convert_condition(condition: &KubeNodeCondition) -> NodeCondition {
    NodeCondition {
        kind: condition.type_.clone(),
        status: ConditionStatus::parse(&condition.status),
        last_transition_time: condition
            .last_transition_time
            .as_ref()
            .map(|t| SystemTime::from(t.0)),
    }
}

/// Whole-number GPU count; anything else counts as zero.
fn gpu_count(node: &str, quantity: &Quantity) -> u64 {
    let raw = quantity.0.trim();
    match integral_quantity(raw) {
        Some(count) => count,
        None => {
            warn!(node, quantity = %raw, "failed to convert allocatable GPU quantity to an integer");
            0
        }
    }
}

/// Value of a resource quantity string (`8`, `8000m`, `1k`, `2Ki`, `3e2`)
/// when it is a non-negative whole number that fits in a `u64`.
pub fn integral_quantity(raw: &str) -> Option<u64> {
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    // Longer mantissas cannot be held exactly.
    if whole.len() + frac.len() > 38 {
        return None;
    }
    let mantissa: u128 = format!("{whole}{frac}").parse().ok()?;

    let (exp10, exp2) = suffix_exponents(suffix)?;
    let scale = exp10 - i32::try_from(frac.len()).ok()?;
    let scaled = mantissa.checked_mul(1u128.checked_shl(exp2)?)?;

    let value = if scale >= 0 {
        scaled.checked_mul(10u128.checked_pow(scale.unsigned_abs())?)?
    } else {
        if scaled == 0 {
            return Some(0);
        }
        let divisor = 10u128.checked_pow(scale.unsigned_abs())?;
        if scaled % divisor != 0 {
            return None;
        }
        scaled / divisor
    };
    u64::try_from(value).ok()
}

/// Decimal and binary exponents for a quantity suffix.
fn suffix_exponents(suffix: &str) -> Option<(i32, u32)> {
    let exponents = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        _ => {
            let exp = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?;
            (exp.parse::<i32>().ok()?, 0)
        }
    };
    Some(exponents)
}
