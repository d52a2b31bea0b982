//! HTTPS endpoint for the mutating admission webhook.
//!
//! # Endpoints
//!
//! - `POST /mutate` - AdmissionReview for pods, answered with an optional JSON patch
//! - `GET /healthz` - liveness probe

use core::error::Error;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use error_stack::Report;
use error_stack::ResultExt;
use poem::get;
use poem::listener::Listener;
use poem::listener::RustlsCertificate;
use poem::listener::RustlsConfig;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::post;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tracing::info;

pub mod handlers;

pub use handlers::WebhookState;

#[derive(Debug, derive_more::Display)]
pub enum ServerError {
    #[display("Failed to load TLS material: {message}")]
    Tls { message: String },
    #[display("Server error: {message}")]
    ServerFailed { message: String },
}

impl Error for ServerError {}

/// Certificate and key in PEM format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TlsFiles {
    async fn load(&self) -> Result<RustlsConfig, Report<ServerError>> {
        let cert = tokio::fs::read(&self.cert)
            .await
            .change_context(ServerError::Tls {
                message: format!("Failed to read certificate {}", self.cert.display()),
            })?;
        let key = tokio::fs::read(&self.key)
            .await
            .change_context(ServerError::Tls {
                message: format!("Failed to read private key {}", self.key.display()),
            })?;
        Ok(RustlsConfig::new().fallback(RustlsCertificate::new().cert(cert).key(key)))
    }
}

/// Webhook routes, wrapped in request tracing.
pub fn routes(state: Arc<WebhookState>) -> impl Endpoint {
    Route::new()
        .at("/mutate", post(handlers::mutate))
        .at("/healthz", get(handlers::healthz))
        .data(state)
        .with(Tracing)
}

pub struct WebhookServer {
    state: Arc<WebhookState>,
    listen_addr: SocketAddr,
    tls: Option<TlsFiles>,
}

impl WebhookServer {
    pub fn new(state: Arc<WebhookState>, listen_addr: SocketAddr, tls: Option<TlsFiles>) -> Self {
        Self {
            state,
            listen_addr,
            tls,
        }
    }

    /// Serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Tls`] if the certificate or key cannot be read
    /// - [`ServerError::ServerFailed`] if the server fails to bind or run
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), Report<ServerError>> {
        let app = routes(self.state);
        let listener = TcpListener::bind(self.listen_addr);

        let result = match &self.tls {
            Some(tls) => {
                let config = tls.load().await?;
                info!("Starting GPU fallback webhook on https://{}", self.listen_addr);
                Server::new(listener.rustls(config))
                    .run_with_graceful_shutdown(app, shutdown, None)
                    .await
            }
            None => {
                info!("Starting GPU fallback webhook on http://{}", self.listen_addr);
                Server::new(listener)
                    .run_with_graceful_shutdown(app, shutdown, None)
                    .await
            }
        };

        result.map_err(|e| {
            Report::new(ServerError::ServerFailed {
                message: format!("Server failed: {e}"),
            })
        })?;
        info!("Webhook server stopped");
        Ok(())
    }
}
