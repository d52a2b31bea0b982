use std::sync::Arc;

use anyhow::Result;
use tracing::error;
use tracing::info;
use utils::version;

use crate::config::ServeArgs;
use crate::domain::policy::FallbackPolicy;
use crate::domain::review::AdmissionOrchestrator;
use crate::infrastructure::capacity::KubeCapacityInspector;
use crate::infrastructure::codec::AdmissionCodec;
use crate::infrastructure::kube_client;
use crate::infrastructure::logging;
use crate::infrastructure::server::WebhookServer;
use crate::infrastructure::server::WebhookState;

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    logging::init();

    info!("Starting GPU fallback webhook {}", &**version::VERSION);

    let client = kube_client::init_kube_client(args.cluster.kubeconfig.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create webhook: {e:?}"))?;

    let inspector = Arc::new(KubeCapacityInspector::new(
        client,
        args.cluster.capacity_timeout(),
    ));
    let orchestrator = AdmissionOrchestrator::new(FallbackPolicy::new(inspector));
    let state = Arc::new(WebhookState::new(AdmissionCodec::default(), orchestrator));

    WebhookServer::new(state, args.listen_addr(), args.tls_files())
        .run(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {e:?}"))?;

    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown requested");
}
