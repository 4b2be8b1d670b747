//! node-agent — reboots unhealthy nodes in a Civo Kubernetes node pool.
//!
//! Single binary that assembles the agent:
//! - Settings (TOML file, environment, CLI flags)
//! - Kubernetes node source (kubeconfig or in-cluster)
//! - Civo compute client
//! - Reconciler + fixed-interval scheduler
//!
//! # Usage
//!
//! ```text
//! CIVO_API_KEY=... CIVO_CLUSTER_ID=... CIVO_NODE_POOL_ID=... node-agent
//! node-agent --config /etc/node-agent/config.toml --log-format json
//! ```

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use node_agent_civo::CivoClient;
use node_agent_kube::KubeNodeSource;
use node_agent_watcher::{Reconciler, Scheduler};

use crate::settings::Settings;

const DEFAULT_LOG_FILTER: &str = "info,node_agent=debug";

#[derive(Parser, Debug)]
#[command(
    name = "node-agent",
    version,
    about = "Reboots unhealthy nodes in a Civo Kubernetes node pool"
)]
struct Cli {
    /// TOML settings file. Environment variables override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Kubeconfig path. Defaults to the in-cluster service account.
    #[arg(long, value_name = "PATH")]
    kubeconfig: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let resolved = settings
        .with_process_env()
        .with_kubeconfig(cli.kubeconfig)
        .resolve()
        .context("invalid configuration")?;

    let config = Arc::new(resolved.watcher);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        cluster_id = %config.cluster_id,
        node_pool = %config.node_pool_selector,
        desired_gpu_count = config.desired_gpu_count,
        reboot_cooldown_secs = config.reboot_cooldown.as_secs(),
        "node-agent starting"
    );

    // ── Initialize clients ─────────────────────────────────────

    let kube = node_agent_kube::connect(resolved.kubeconfig.as_deref())
        .await
        .context("failed to create kubernetes client")?;
    let nodes = Arc::new(KubeNodeSource::new(kube));
    info!("kubernetes node source initialized");

    let civo = Arc::new(CivoClient::new(&resolved.civo).context("failed to create civo client")?);
    info!(api_url = %resolved.civo.api_url, region = %resolved.civo.region, "civo client initialized");

    let reconciler = Arc::new(Reconciler::new(config, nodes, civo));
    let scheduler = Scheduler::new(reconciler);

    // ── Run until signalled ────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    shutdown_signal().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let ticks = watcher.await.context("watcher task failed")?;
    info!(ticks, "node-agent stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to install CTRL+C handler")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;

    Ok(())
}
