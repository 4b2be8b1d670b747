//! Collaborator traits consumed by the reconciler.
//!
//! Both traits hand back boxed futures so they can sit behind
//! `Arc<dyn ...>` and be swapped for in-memory fakes in tests. Callers
//! are expected to set deadlines at the transport layer; the engine does
//! not wrap these calls in timeouts.

use std::future::Future;
use std::pin::Pin;

use crate::types::{Instance, LabelSelector, NodeSnapshot};

/// Boxed, `Send` future returned by collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lists the nodes of a pool.
pub trait NodeSource: Send + Sync {
    /// Return every node matching `selector` as one consistent snapshot.
    fn list_nodes<'a>(
        &'a self,
        selector: &'a LabelSelector,
    ) -> BoxFuture<'a, anyhow::Result<Vec<NodeSnapshot>>>;
}

/// Locates and hard-reboots the compute instance behind a node.
pub trait InstanceRebooter: Send + Sync {
    /// Find the instance backing `node_name` in cluster `cluster_id`.
    fn find_instance<'a>(
        &'a self,
        cluster_id: &'a str,
        node_name: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Instance>>;

    /// Issue a hard reboot for `instance_id`.
    fn hard_reboot<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}
