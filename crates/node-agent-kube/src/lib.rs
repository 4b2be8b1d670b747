//! node-agent-kube — Kubernetes-backed [`NodeSource`].
//!
//! Builds an authenticated `kube::Client` (explicit kubeconfig path or
//! in-cluster service account) and lists pool nodes by label selector,
//! converting each `Node` into a [`NodeSnapshot`].
//!
//! [`NodeSource`]: node_agent_core::NodeSource
//! [`NodeSnapshot`]: node_agent_core::NodeSnapshot

pub mod client;
pub mod source;

pub use client::{KubeSourceError, connect};
pub use source::{KubeNodeSource, integral_quantity, snapshot_from_node};
