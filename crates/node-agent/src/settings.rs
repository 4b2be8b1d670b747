//! Layered agent settings: TOML file, then environment, then CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::warn;

use node_agent_civo::CivoConfig;
use node_agent_core::{MissingReadyPolicy, WatcherConfig, WatcherError, WatcherResult};

pub const ENV_API_URL: &str = "CIVO_API_URL";
pub const ENV_API_KEY: &str = "CIVO_API_KEY";
pub const ENV_REGION: &str = "CIVO_REGION";
pub const ENV_CLUSTER_ID: &str = "CIVO_CLUSTER_ID";
pub const ENV_NODE_POOL_ID: &str = "CIVO_NODE_POOL_ID";
pub const ENV_DESIRED_GPU_COUNT: &str = "CIVO_NODE_DESIRED_GPU_COUNT";
pub const ENV_REBOOT_TIME_WINDOW_MINUTES: &str = "CIVO_NODE_REBOOT_TIME_WINDOW_MINUTES";
pub const ENV_TICK_INTERVAL_SECS: &str = "NODE_AGENT_TICK_INTERVAL_SECS";
pub const ENV_SUPPRESS_WHEN_READY_MISSING: &str = "NODE_AGENT_SUPPRESS_WHEN_READY_MISSING";
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";

/// Raw settings before validation. Every field is optional so layers
/// can be merged; later layers override earlier ones field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub region: Option<String>,
    pub cluster_id: Option<String>,
    pub node_pool_id: Option<String>,
    /// Kept textual so invalid values fall back the same way from any layer.
    #[serde(deserialize_with = "text_or_integer")]
    pub desired_gpu_count: Option<String>,
    #[serde(deserialize_with = "text_or_integer")]
    pub reboot_time_window_minutes: Option<String>,
    pub tick_interval_secs: Option<u64>,
    pub suppress_when_ready_missing: Option<bool>,
    pub kubeconfig: Option<PathBuf>,
}

/// Validated settings, split per consumer.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub watcher: WatcherConfig,
    pub civo: CivoConfig,
    pub kubeconfig: Option<PathBuf>,
}

impl Settings {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Overlay values from the environment. `lookup` returns the value of
    /// a variable; blank values count as unset.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        overlay(&mut self.api_url, get(ENV_API_URL));
        overlay(&mut self.api_key, get(ENV_API_KEY));
        overlay(&mut self.region, get(ENV_REGION));
        overlay(&mut self.cluster_id, get(ENV_CLUSTER_ID));
        overlay(&mut self.node_pool_id, get(ENV_NODE_POOL_ID));
        overlay(&mut self.desired_gpu_count, get(ENV_DESIRED_GPU_COUNT));
        overlay(
            &mut self.reboot_time_window_minutes,
            get(ENV_REBOOT_TIME_WINDOW_MINUTES),
        );
        overlay(&mut self.kubeconfig, get(ENV_KUBECONFIG).map(PathBuf::from));

        if let Some(raw) = get(ENV_TICK_INTERVAL_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) => self.tick_interval_secs = Some(secs),
                Err(_) => warn!(
                    variable = ENV_TICK_INTERVAL_SECS,
                    value = %raw,
                    "invalid tick interval, ignoring"
                ),
            }
        }
        if let Some(raw) = get(ENV_SUPPRESS_WHEN_READY_MISSING) {
            match parse_bool(&raw) {
                Some(flag) => self.suppress_when_ready_missing = Some(flag),
                None => warn!(
                    variable = ENV_SUPPRESS_WHEN_READY_MISSING,
                    value = %raw,
                    "invalid boolean, ignoring"
                ),
            }
        }
        self
    }

    /// Overlay values from the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Overlay the command-line kubeconfig path.
    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        overlay(&mut self.kubeconfig, kubeconfig);
        self
    }

    /// Validate and split into the engine and client configurations.
    pub fn resolve(self) -> WatcherResult<Resolved> {
        let cluster_id = trimmed(self.cluster_id);
        let node_pool_id = trimmed(self.node_pool_id);

        let mut builder = WatcherConfig::builder(cluster_id, node_pool_id);
        if let Some(raw) = &self.desired_gpu_count {
            builder = builder.desired_gpu_count_str(raw);
        }
        if let Some(raw) = &self.reboot_time_window_minutes {
            builder = builder.reboot_cooldown_minutes_str(raw);
        }
        if let Some(secs) = self.tick_interval_secs {
            builder = builder.tick_interval(Duration::from_secs(secs));
        }
        if self.suppress_when_ready_missing == Some(true) {
            builder = builder.missing_ready_policy(MissingReadyPolicy::Suppress);
        }
        let watcher = builder.build()?;

        let api_key = trimmed(self.api_key);
        if api_key.is_empty() {
            return Err(WatcherError::Config("civo API key is not set".to_string()));
        }
        let civo = CivoConfig::new(api_key, trimmed(self.region), watcher.cluster_id.clone())
            .with_api_url(trimmed(self.api_url));

        Ok(Resolved {
            watcher,
            civo,
            kubeconfig: self.kubeconfig.filter(|p| !p.as_os_str().is_empty()),
        })
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn text_or_integer<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Integer(i64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Integer(n) => n.to_string(),
        Raw::Text(s) => s,
    }))
}
