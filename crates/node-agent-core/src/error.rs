//! Error types for the reconciliation engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type WatcherResult<T> = Result<T, WatcherError>;

/// Errors surfaced by a tick or by startup validation.
///
/// Collaborator failures arrive as `anyhow::Error` and are wrapped with the
/// identifiers needed to diagnose them without re-querying state.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to list nodes, selector: {selector}: {source}")]
    Retrieval {
        selector: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to find instance, cluster_id: {cluster_id}, node_name: {node_name}: {source}")]
    InstanceLookup {
        cluster_id: String,
        node_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to reboot instance, cluster_id: {cluster_id}, instance_id: {instance_id}: {source}")]
    Remediation {
        cluster_id: String,
        instance_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("a reconciliation tick is already in flight")]
    TickInProgress,
}
