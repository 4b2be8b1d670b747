//! In-memory collaborators for exercising the reconciler without a
//! cluster or a compute API.
//!
//! Both fakes record every call so tests can assert exactly which side
//! effects a tick produced.

use std::sync::Mutex;

use node_agent_core::*;

type FindFn = Box<dyn Fn(&str, &str) -> anyhow::Result<Instance> + Send + Sync>;
type RebootFn = Box<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// Node source that returns a fixed listing or a fixed error.
///
/// Listed nodes are filtered by the selector; nodes with no labels at all
/// are always returned.
pub struct FakeNodeSource {
    listing: Result<Vec<NodeSnapshot>, String>,
    selectors: Mutex<Vec<String>>,
}

impl FakeNodeSource {
    pub fn with_nodes(nodes: Vec<NodeSnapshot>) -> Self {
        Self {
            listing: Ok(nodes),
            selectors: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            listing: Err(message.into()),
            selectors: Mutex::new(Vec::new()),
        }
    }

    /// Rendered selectors of every listing call, in order.
    pub fn selectors(&self) -> Vec<String> {
        lock(&self.selectors).clone()
    }

    pub fn list_calls(&self) -> usize {
        lock(&self.selectors).len()
    }
}

impl NodeSource for FakeNodeSource {
    fn list_nodes<'a>(
        &'a self,
        selector: &'a LabelSelector,
    ) -> BoxFuture<'a, anyhow::Result<Vec<NodeSnapshot>>> {
        lock(&self.selectors).push(selector.to_string());
        let result = match &self.listing {
            Ok(nodes) => Ok(nodes
                .iter()
                .filter(|n| n.labels.is_empty() || selector.matches(&n.labels))
                .cloned()
                .collect()),
            Err(message) => Err(anyhow::anyhow!("{message}")),
        };
        Box::pin(async move { result })
    }
}

/// Instance locator/rebooter with overridable behavior.
///
/// By default every node maps to instance `instance-{node_name}` and
/// every reboot succeeds.
pub struct FakeRebooter {
    find_fn: Option<FindFn>,
    reboot_fn: Option<RebootFn>,
    find_calls: Mutex<Vec<String>>,
    reboot_calls: Mutex<Vec<String>>,
}

impl FakeRebooter {
    pub fn new() -> Self {
        Self {
            find_fn: None,
            reboot_fn: None,
            find_calls: Mutex::new(Vec::new()),
            reboot_calls: Mutex::new(Vec::new()),
        }
    }

    /// Override instance lookup. Receives `(cluster_id, node_name)`.
    pub fn with_find_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        self.find_fn = Some(Box::new(f));
        self
    }

    /// Override the reboot call. Receives the instance ID.
    pub fn with_reboot_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.reboot_fn = Some(Box::new(f));
        self
    }

    /// Node names passed to `find_instance`, in call order.
    pub fn find_calls(&self) -> Vec<String> {
        lock(&self.find_calls).clone()
    }

    /// Instance IDs passed to `hard_reboot`, in call order.
    pub fn reboot_calls(&self) -> Vec<String> {
        lock(&self.reboot_calls).clone()
    }
}

impl Default for FakeRebooter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRebooter for FakeRebooter {
    fn find_instance<'a>(
        &'a self,
        cluster_id: &'a str,
        node_name: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Instance>> {
        lock(&self.find_calls).push(node_name.to_string());
        let result = match &self.find_fn {
            Some(f) => f(cluster_id, node_name),
            None => Ok(Instance {
                id: format!("instance-{node_name}"),
                hostname: node_name.to_string(),
            }),
        };
        Box::pin(async move { result })
    }

    fn hard_reboot<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        lock(&self.reboot_calls).push(instance_id.to_string());
        let result = match &self.reboot_fn {
            Some(f) => f(instance_id),
            None => Ok(()),
        };
        Box::pin(async move { result })
    }
}

/// Lock, ignoring poisoning.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
