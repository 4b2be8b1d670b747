//! Wire types for the Civo API.

use serde::{Deserialize, Serialize};

use node_agent_core::Instance;

/// Instance record as returned by the Civo API. Only the fields the
/// agent reads are decoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiInstance {
    pub id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub status: String,
}

impl From<ApiInstance> for Instance {
    fn from(api: ApiInstance) -> Self {
        Instance {
            id: api.id,
            hostname: api.hostname,
        }
    }
}

/// Body of `POST /v2/instances/{id}/hard_reboots`.
#[derive(Debug, Clone, Serialize)]
pub struct RebootRequest<'a> {
    pub region: &'a str,
}

/// Generic `{"result": "..."}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct SimpleResponse {
    #[serde(default)]
    pub result: String,
}
