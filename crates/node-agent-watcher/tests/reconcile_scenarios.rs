//! End-to-end reconciliation scenarios against in-memory collaborators.
//!
//! Every test drives a full tick through `Reconciler::run_once_at` with a
//! fixed clock and asserts exactly which lookups and reboots were issued.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Notify;

use node_agent_core::*;
use node_agent_watcher::Reconciler;
use node_agent_watcher::fake::{FakeNodeSource, FakeRebooter};

const POOL: &str = "pool-gpu";

fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_750_000_000)
}

fn mins_ago(mins: u64) -> SystemTime {
    now() - Duration::from_secs(mins * 60)
}

fn config(desired_gpu_count: u32) -> Arc<WatcherConfig> {
    Arc::new(
        WatcherConfig::builder("test-cluster-123", POOL)
            .desired_gpu_count(desired_gpu_count)
            .reboot_cooldown(Duration::from_secs(40 * 60))
            .build()
            .unwrap(),
    )
}

fn pool_node(name: &str) -> NodeSnapshot {
    NodeSnapshot::new(name).with_label(NODE_POOL_LABEL_KEY, POOL)
}

fn ready_node(name: &str, gpus: u64) -> NodeSnapshot {
    pool_node(name)
        .with_condition(NodeCondition::ready(ConditionStatus::True, mins_ago(120)))
        .with_allocatable_gpu(gpus)
}

fn not_ready_node(name: &str, transitioned: SystemTime) -> NodeSnapshot {
    pool_node(name).with_condition(NodeCondition::ready(ConditionStatus::False, transitioned))
}

fn reconciler(
    config: Arc<WatcherConfig>,
    nodes: Arc<FakeNodeSource>,
    rebooter: Arc<FakeRebooter>,
) -> Reconciler {
    Reconciler::new(config, nodes, rebooter)
}

// ── Healthy nodes ──────────────────────────────────────────────────

#[tokio::test]
async fn healthy_gpu_node_is_left_alone() {
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![ready_node("node-01", 8)]));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(8), nodes, rebooter.clone());

    let report = reconciler.run_once_at(now()).await.unwrap();

    assert_eq!(report.listed, 1);
    assert_eq!(report.skipped(SkipReason::Healthy), 1);
    assert!(rebooter.find_calls().is_empty());
    assert!(rebooter.reboot_calls().is_empty());
}

// ── Reboot ─────────────────────────────────────────────────────────

#[tokio::test]
async fn long_not_ready_node_is_rebooted_once() {
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![not_ready_node(
        "node-01",
        mins_ago(60),
    )]));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(0), nodes, rebooter.clone());

    let report = reconciler.run_once_at(now()).await.unwrap();

    assert_eq!(rebooter.find_calls(), vec!["node-01".to_string()]);
    assert_eq!(rebooter.reboot_calls(), vec!["instance-node-01".to_string()]);
    assert_eq!(report.rebooted(), vec!["instance-node-01"]);
}

// ── Cooldown ───────────────────────────────────────────────────────

#[tokio::test]
async fn recently_flipped_node_is_suppressed() {
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![not_ready_node(
        "node-01",
        mins_ago(1),
    )]));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(0), nodes, rebooter.clone());

    let report = reconciler.run_once_at(now()).await.unwrap();

    assert_eq!(report.skipped(SkipReason::CoolingDown), 1);
    assert!(rebooter.find_calls().is_empty());
    assert!(rebooter.reboot_calls().is_empty());
}

#[tokio::test]
async fn suppressed_node_is_rebooted_once_cooldown_passes() {
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![not_ready_node(
        "node-01",
        mins_ago(39),
    )]));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(0), nodes, rebooter.clone());

    reconciler.run_once_at(now()).await.unwrap();
    assert!(rebooter.reboot_calls().is_empty());

    let later = now() + Duration::from_secs(2 * 60);
    reconciler.run_once_at(later).await.unwrap();
    assert_eq!(rebooter.reboot_calls(), vec!["instance-node-01".to_string()]);
}

// ── Listing failure ────────────────────────────────────────────────

#[tokio::test]
async fn listing_failure_aborts_tick() {
    let nodes = Arc::new(FakeNodeSource::failing("the server is currently unable to handle the request"));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(0), nodes.clone(), rebooter.clone());

    let err = reconciler.run_once_at(now()).await.unwrap_err();

    assert!(matches!(err, WatcherError::Retrieval { .. }));
    assert!(err.to_string().contains("unable to handle the request"));
    assert_eq!(nodes.list_calls(), 1);
    assert!(rebooter.find_calls().is_empty());
    assert!(rebooter.reboot_calls().is_empty());
}

// ── Remediation failure ────────────────────────────────────────────

#[tokio::test]
async fn first_remediation_failure_stops_the_tick() {
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![
        not_ready_node("node-01", mins_ago(60)),
        not_ready_node("node-02", mins_ago(60)),
    ]));
    let rebooter = Arc::new(FakeRebooter::new().with_reboot_fn(|id| {
        if id == "instance-node-01" {
            Err(anyhow::anyhow!("instance is locked"))
        } else {
            Ok(())
        }
    }));
    let reconciler = reconciler(config(0), nodes, rebooter.clone());

    let err = reconciler.run_once_at(now()).await.unwrap_err();

    match err {
        WatcherError::Remediation {
            cluster_id,
            instance_id,
            ..
        } => {
            assert_eq!(cluster_id, "test-cluster-123");
            assert_eq!(instance_id, "instance-node-01");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(rebooter.find_calls(), vec!["node-01".to_string()]);
    assert_eq!(rebooter.reboot_calls(), vec!["instance-node-01".to_string()]);
}

#[tokio::test]
async fn lookup_failure_stops_the_tick() {
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![
        not_ready_node("node-01", mins_ago(60)),
        not_ready_node("node-02", mins_ago(60)),
    ]));
    let rebooter = Arc::new(
        FakeRebooter::new().with_find_fn(|_, node| Err(anyhow::anyhow!("no instance for {node}"))),
    );
    let reconciler = reconciler(config(0), nodes, rebooter.clone());

    let err = reconciler.run_once_at(now()).await.unwrap_err();

    assert!(matches!(
        err,
        WatcherError::InstanceLookup { ref node_name, .. } if node_name == "node-01"
    ));
    assert_eq!(rebooter.find_calls(), vec!["node-01".to_string()]);
    assert!(rebooter.reboot_calls().is_empty());
}

// ── Mixed pools ───────────────────────────────────────────────────

#[tokio::test]
async fn nodes_are_evaluated_in_listing_order() {
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![
        not_ready_node("node-03", mins_ago(90)),
        ready_node("node-01", 8),
        not_ready_node("node-02", mins_ago(5)),
        ready_node("node-04", 4),
    ]));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(8), nodes, rebooter.clone());

    let report = reconciler.run_once_at(now()).await.unwrap();

    let order: Vec<&str> = report.outcomes.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(order, vec!["node-03", "node-01", "node-02", "node-04"]);
    assert_eq!(
        rebooter.reboot_calls(),
        vec!["instance-node-03".to_string(), "instance-node-04".to_string()]
    );
    assert_eq!(report.skipped(SkipReason::Healthy), 1);
    assert_eq!(report.skipped(SkipReason::CoolingDown), 1);
}

#[tokio::test]
async fn nodes_outside_pool_are_not_considered() {
    let stray = NodeSnapshot::new("other-pool-node")
        .with_label(NODE_POOL_LABEL_KEY, "pool-cpu")
        .with_condition(NodeCondition::ready(ConditionStatus::False, mins_ago(90)));
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![stray, ready_node("node-01", 8)]));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(8), nodes, rebooter.clone());

    let report = reconciler.run_once_at(now()).await.unwrap();

    assert_eq!(report.listed, 1);
    assert!(rebooter.reboot_calls().is_empty());
}

#[tokio::test]
async fn duplicate_ready_conditions_use_first_for_health_and_latest_for_cooldown() {
    // First entry says NotReady (so unhealthy), a later duplicate flipped
    // two minutes ago (so still cooling down).
    let node = pool_node("node-01")
        .with_condition(NodeCondition::ready(ConditionStatus::False, mins_ago(180)))
        .with_condition(NodeCondition::ready(ConditionStatus::True, mins_ago(2)));
    let nodes = Arc::new(FakeNodeSource::with_nodes(vec![node]));
    let rebooter = Arc::new(FakeRebooter::new());
    let reconciler = reconciler(config(0), nodes, rebooter.clone());

    let report = reconciler.run_once_at(now()).await.unwrap();

    assert_eq!(report.skipped(SkipReason::CoolingDown), 1);
    assert!(rebooter.reboot_calls().is_empty());
}

#[tokio::test]
async fn missing_ready_condition_follows_policy() {
    let bare = || pool_node("node-01");

    let rebooter = Arc::new(FakeRebooter::new());
    let default_policy = reconciler(
        config(0),
        Arc::new(FakeNodeSource::with_nodes(vec![bare()])),
        rebooter.clone(),
    );
    default_policy.run_once_at(now()).await.unwrap();
    assert_eq!(rebooter.reboot_calls(), vec!["instance-node-01".to_string()]);

    let suppress_config = Arc::new(
        WatcherConfig::builder("test-cluster-123", POOL)
            .missing_ready_policy(MissingReadyPolicy::Suppress)
            .build()
            .unwrap(),
    );
    let rebooter = Arc::new(FakeRebooter::new());
    let suppressing = reconciler(
        suppress_config,
        Arc::new(FakeNodeSource::with_nodes(vec![bare()])),
        rebooter.clone(),
    );
    let report = suppressing.run_once_at(now()).await.unwrap();
    assert_eq!(report.skipped(SkipReason::CoolingDown), 1);
    assert!(rebooter.reboot_calls().is_empty());
}

// ── Overlap guard ─────────────────────────────────────────────────

/// Node source that blocks inside `list_nodes` until released.
struct GatedNodeSource {
    entered: Notify,
    release: Notify,
}

impl NodeSource for GatedNodeSource {
    fn list_nodes<'a>(
        &'a self,
        _selector: &'a LabelSelector,
    ) -> BoxFuture<'a, anyhow::Result<Vec<NodeSnapshot>>> {
        Box::pin(async move {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        })
    }
}

#[tokio::test]
async fn overlapping_tick_is_rejected() {
    let source = Arc::new(GatedNodeSource {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let reconciler = Arc::new(Reconciler::new(
        config(0),
        source.clone(),
        Arc::new(FakeRebooter::new()),
    ));

    let running = reconciler.clone();
    let first = tokio::spawn(async move { running.run_once_at(now()).await });
    source.entered.notified().await;

    let overlapping = reconciler.run_once_at(now()).await;
    assert!(matches!(overlapping, Err(WatcherError::TickInProgress)));

    source.release.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.listed, 0);

    // The flag is released once the first tick finishes.
    source.release.notify_one();
    assert!(reconciler.run_once_at(now()).await.is_ok());
}
