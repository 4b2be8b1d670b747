//! node-agent-civo — Civo-backed [`InstanceRebooter`].
//!
//! Talks to the Civo REST API to map a Kubernetes node name onto the
//! compute instance behind it and to hard-reboot that instance.
//!
//! ```text
//! GET  {api_url}/v2/kubernetes/clusters/{cluster_id}/instances?region=..
//! POST {api_url}/v2/instances/{instance_id}/hard_reboots?region=..
//! ```
//!
//! [`InstanceRebooter`]: node_agent_core::InstanceRebooter

pub mod client;
pub mod error;
pub mod types;

pub use client::{CivoClient, CivoConfig, DEFAULT_API_URL, select_instance};
pub use error::{CivoError, CivoResult};
pub use types::ApiInstance;
