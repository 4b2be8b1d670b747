//! Kubernetes client construction.

use std::path::{Path, PathBuf};

use kube::config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config};
use thiserror::Error;
use tracing::info;

/// Errors raised while building the client or listing nodes.
#[derive(Debug, Error)]
pub enum KubeSourceError {
    #[error("failed to build kubeconfig from path {}: {source}", .path.display())]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to load in-cluster kubeconfig: {0}")]
    InCluster(#[from] InClusterError),

    #[error("failed to create kubernetes API client: {0}")]
    Client(#[source] kube::Error),

    #[error("failed to list nodes: {0}")]
    List(#[source] kube::Error),
}

/// Create a client from `kubeconfig` if given, otherwise from the
/// in-cluster service account environment.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client, KubeSourceError> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig_error = |source| KubeSourceError::Kubeconfig {
                path: path.to_path_buf(),
                source,
            };
            let raw = Kubeconfig::read_from(path).map_err(kubeconfig_error)?;
            let config = Config::from_custom_kubeconfig(raw, &KubeConfigOptions::default())
                .await
                .map_err(kubeconfig_error)?;
            info!(path = %path.display(), "using kubeconfig");
            config
        }
        None => {
            let config = Config::incluster()?;
            info!("using in-cluster kubeconfig");
            config
        }
    };

    Client::try_from(config).map_err(KubeSourceError::Client)
}
