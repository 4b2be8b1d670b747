//! node-agent-core — shared vocabulary for the node-agent workspace.
//!
//! Holds the per-tick node view ([`NodeSnapshot`]), the immutable
//! [`WatcherConfig`] resolved at startup, the [`WatcherError`] taxonomy,
//! and the two collaborator traits the reconciliation engine consumes:
//!
//! ```text
//! NodeSource        list_nodes(selector)            -> Vec<NodeSnapshot>
//! InstanceRebooter  find_instance(cluster, node)    -> Instance
//!                   hard_reboot(instance_id)        -> ()
//! ```
//!
//! Nothing in this crate performs I/O. The Kubernetes and Civo crates
//! implement the traits; the watcher crate drives them.

pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::{MissingReadyPolicy, WatcherConfig, WatcherConfigBuilder};
pub use error::{WatcherError, WatcherResult};
pub use provider::{BoxFuture, InstanceRebooter, NodeSource};
pub use types::*;
