//! HTTP client for the Civo compute API.

use std::fmt;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use node_agent_core::{BoxFuture, Instance, InstanceRebooter};

use crate::error::{CivoError, CivoResult};
use crate::types::{ApiInstance, RebootRequest, SimpleResponse};

/// Public Civo API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.civo.com";

/// Transport deadline for every API request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`CivoClient`].
#[derive(Clone)]
pub struct CivoConfig {
    pub api_key: String,
    pub api_url: String,
    pub region: String,
    /// Cluster the agent runs for; tagged into the user agent.
    pub cluster_id: String,
    pub timeout: Duration,
}

impl CivoConfig {
    pub fn new(
        api_key: impl Into<String>,
        region: impl Into<String>,
        cluster_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            region: region.into(),
            cluster_id: cluster_id.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        if !api_url.trim().is_empty() {
            self.api_url = api_url;
        }
        self
    }
}

impl fmt::Debug for CivoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CivoConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("region", &self.region)
            .field("cluster_id", &self.cluster_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Authenticated Civo API client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CivoClient {
    http: reqwest::Client,
    api_url: String,
    region: String,
}

impl CivoClient {
    pub fn new(config: &CivoConfig) -> CivoResult<Self> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(CivoError::MissingApiKey);
        }

        let mut auth = HeaderValue::from_str(&format!("bearer {api_key}"))
            .map_err(|_| CivoError::InvalidApiKey)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(user_agent(&config.cluster_id))
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim().trim_end_matches('/').to_string(),
            region: config.region.trim().to_string(),
        })
    }

    /// All instances that make up a Kubernetes cluster.
    pub async fn list_cluster_instances(&self, cluster_id: &str) -> CivoResult<Vec<ApiInstance>> {
        let url = format!("{}/v2/kubernetes/clusters/{cluster_id}/instances", self.api_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("region", self.region.as_str())])
            .send()
            .await?;
        let instances: Vec<ApiInstance> = check(resp).await?.json().await?;
        debug!(%cluster_id, count = instances.len(), "listed cluster instances");
        Ok(instances)
    }

    /// Find the cluster instance whose hostname or ID matches `search`.
    pub async fn find_cluster_instance(
        &self,
        cluster_id: &str,
        search: &str,
    ) -> CivoResult<ApiInstance> {
        let instances = self.list_cluster_instances(cluster_id).await?;
        let instance = select_instance(instances, search)?;
        debug!(
            %search,
            instance_id = %instance.id,
            hostname = %instance.hostname,
            status = %instance.status,
            "matched cluster instance"
        );
        Ok(instance)
    }

    /// Hard-reboot an instance (power cycle, no guest shutdown).
    pub async fn hard_reboot_instance(&self, instance_id: &str) -> CivoResult<()> {
        let url = format!("{}/v2/instances/{instance_id}/hard_reboots", self.api_url);
        let resp = self
            .http
            .post(&url)
            .query(&[("region", self.region.as_str())])
            .json(&RebootRequest {
                region: &self.region,
            })
            .send()
            .await?;
        let resp = check(resp).await?;

        // The reboot is accepted once the API answers 2xx; the body is informational.
        match resp.json::<SimpleResponse>().await {
            Ok(ack) => info!(%instance_id, result = %ack.result, "hard reboot requested"),
            Err(e) => warn!(
                %instance_id,
                error = %e,
                "hard reboot requested, acknowledgement could not be decoded"
            ),
        }
        Ok(())
    }
}

impl InstanceRebooter for CivoClient {
    fn find_instance<'a>(
        &'a self,
        cluster_id: &'a str,
        node_name: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Instance>> {
        Box::pin(async move {
            let instance = self.find_cluster_instance(cluster_id, node_name).await?;
            Ok::<Instance, anyhow::Error>(instance.into())
        })
    }

    fn hard_reboot<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.hard_reboot_instance(instance_id).await?;
            Ok::<(), anyhow::Error>(())
        })
    }
}

/// Pick the instance matching `search`.
///
/// An exact hostname or ID match always wins. Otherwise exactly one
/// instance may contain `search` in its hostname or ID.
pub fn select_instance(instances: Vec<ApiInstance>, search: &str) -> CivoResult<ApiInstance> {
    let mut partial = Vec::new();
    for instance in instances {
        if instance.hostname == search || instance.id == search {
            return Ok(instance);
        }
        if instance.hostname.contains(search) || instance.id.contains(search) {
            partial.push(instance);
        }
    }

    match partial.len() {
        0 => Err(CivoError::ZeroMatches(search.to_string())),
        1 => Ok(partial.remove(0)),
        count => Err(CivoError::MultipleMatches {
            search: search.to_string(),
            count,
        }),
    }
}

fn user_agent(cluster_id: &str) -> String {
    format!(
        "node-agent/{} (cluster {})",
        env!("CARGO_PKG_VERSION"),
        cluster_id.trim()
    )
}

/// Turn a non-2xx response into [`CivoError::Api`].
async fn check(resp: reqwest::Response) -> CivoResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CivoError::Api {
        status: status.as_u16(),
        body,
    })
}
