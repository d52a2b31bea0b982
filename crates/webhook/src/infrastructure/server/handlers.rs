use std::sync::Arc;

use kube::api::DynamicObject;
use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionResponse;
use poem::handler;
use poem::http::StatusCode;
use poem::web::Data;
use poem::Request;
use poem::Response;
use tracing::debug;
use tracing::error;

use crate::domain::review::allow_with_message;
use crate::domain::review::AdmissionOrchestrator;
use crate::infrastructure::codec::AdmissionCodec;

/// Shared state for webhook handlers
pub struct WebhookState {
    codec: AdmissionCodec,
    orchestrator: AdmissionOrchestrator,
}

impl WebhookState {
    pub fn new(codec: AdmissionCodec, orchestrator: AdmissionOrchestrator) -> Self {
        Self {
            codec,
            orchestrator,
        }
    }

    /// Produce the response for a decoded request. Never fails: pod decode
    /// errors are reported in an allowed response.
    pub async fn admit(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        match self.codec.decode_pod(request) {
            Ok(Some(pod)) => self.orchestrator.review(&pod).await.into_response(request),
            Ok(None) => {
                debug!(uid = %request.uid, "No pod object in request, allowing unchanged");
                AdmissionResponse::from(request)
            }
            Err(e) => {
                error!(uid = %request.uid, "Could not unmarshal pod: {e:?}");
                allow_with_message(request, e.current_context().to_string())
            }
        }
    }
}

/// Handle a mutating AdmissionReview for pods.
#[handler]
pub async fn mutate(req: &Request, body: Vec<u8>, state: Data<&Arc<WebhookState>>) -> Response {
    if let Err(e) = state.codec.check_content_type(req.content_type()) {
        error!("{e:?}");
        return Response::builder()
            .status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .body(e.current_context().to_string());
    }

    let response = match state.codec.decode_request(&body) {
        Ok(request) => state.admit(&request).await,
        Err(e) => {
            error!("Can't decode body: {e:?}");
            AdmissionResponse::invalid(e.current_context().to_string())
        }
    };

    match state.codec.encode_response(response) {
        Ok(bytes) => Response::builder()
            .content_type(state.codec.content_type())
            .body(bytes),
        Err(e) => {
            error!("Can't encode response: {e:?}");
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(format!("could not encode response: {}", e.current_context()))
        }
    }
}

#[handler]
pub fn healthz() -> &'static str {
    "ok"
}
