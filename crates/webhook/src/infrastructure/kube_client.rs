use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum KubeClientError {
    #[error("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
}

/// Build the client used for node listings.
///
/// Deployed webhooks run with no kubeconfig and pick up the in-cluster
/// service account; an explicit path is for running against a cluster from a
/// workstation.
pub async fn init_kube_client(
    kubeconfig: Option<PathBuf>,
) -> Result<Client, Report<KubeClientError>> {
    let config = match kubeconfig {
        Some(path) => {
            info!("Using kubeconfig {}", path.display());
            config_from_file(&path).await?
        }
        None => {
            info!("Using in-cluster or default Kubernetes configuration");
            Config::infer()
                .await
                .change_context(KubeClientError::ConnectionFailed {
                    message: "No in-cluster or default configuration found".to_string(),
                })?
        }
    };

    Client::try_from(config).change_context(KubeClientError::ConnectionFailed {
        message: "Failed to build Kubernetes client".to_string(),
    })
}

async fn config_from_file(path: &Path) -> Result<Config, Report<KubeClientError>> {
    let kubeconfig =
        Kubeconfig::read_from(path).change_context(KubeClientError::ConnectionFailed {
            message: format!("Failed to read kubeconfig file: {}", path.display()),
        })?;

    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .change_context(KubeClientError::ConnectionFailed {
            message: format!("Invalid kubeconfig: {}", path.display()),
        })
}
