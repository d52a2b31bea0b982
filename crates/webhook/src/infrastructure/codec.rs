//! AdmissionReview wire codec.

use core::error::Error;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionResponse;
use kube::core::admission::AdmissionReview;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, derive_more::Display)]
pub enum CodecError {
    #[display("contentType={content_type}, expect {expected}")]
    UnsupportedContentType {
        content_type: String,
        expected: &'static str,
    },
    #[display("Invalid admission review: {message}")]
    InvalidReview { message: String },
    #[display("Could not decode pod: {message}")]
    InvalidPod { message: String },
    #[display("Could not encode admission review: {message}")]
    Encode { message: String },
}

impl Error for CodecError {}

/// Decodes admission requests and encodes responses.
///
/// Constructed once at startup and shared read-only by all requests.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionCodec {
    content_type: &'static str,
}

impl Default for AdmissionCodec {
    fn default() -> Self {
        Self::new(JSON_CONTENT_TYPE)
    }
}

impl AdmissionCodec {
    pub const fn new(content_type: &'static str) -> Self {
        Self { content_type }
    }

    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Media type parameters such as `charset` are ignored.
    pub fn check_content_type(
        &self,
        content_type: Option<&str>,
    ) -> Result<(), Report<CodecError>> {
        let essence = content_type
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        if essence.eq_ignore_ascii_case(self.content_type) {
            return Ok(());
        }
        Err(Report::new(CodecError::UnsupportedContentType {
            content_type: content_type.unwrap_or_default().to_string(),
            expected: self.content_type,
        }))
    }

    pub fn decode_request(
        &self,
        body: &[u8],
    ) -> Result<AdmissionRequest<DynamicObject>, Report<CodecError>> {
        let review: AdmissionReview<DynamicObject> =
            serde_json::from_slice(body).change_context(CodecError::InvalidReview {
                message: "malformed AdmissionReview body".to_string(),
            })?;

        let request: Result<AdmissionRequest<DynamicObject>, _> = review.try_into();
        request.change_context(CodecError::InvalidReview {
            message: "AdmissionReview carries no request".to_string(),
        })
    }

    /// Extract the pod under review. `None` when the request has no object,
    /// e.g. for DELETE operations.
    pub fn decode_pod(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<Option<Pod>, Report<CodecError>> {
        let Some(object) = &request.object else {
            return Ok(None);
        };

        let value = serde_json::to_value(object).change_context(CodecError::InvalidPod {
            message: format!("object of request {} is not serializable", request.uid),
        })?;
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Report::new(CodecError::InvalidPod { message: e.to_string() }))
    }

    pub fn encode_response(
        &self,
        response: AdmissionResponse,
    ) -> Result<Vec<u8>, Report<CodecError>> {
        serde_json::to_vec(&response.into_review()).map_err(|e| {
            Report::new(CodecError::Encode {
                message: e.to_string(),
            })
        })
    }
}
