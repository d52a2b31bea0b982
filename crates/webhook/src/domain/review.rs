//! Admission orchestration: runs the fallback policy over every container of a
//! pod and folds the resulting decisions into one patch.

use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionResponse;
use tracing::error;
use tracing::info;

use super::patch::to_json_patch;
use super::patch::PatchBuilder;
use super::patch::PatchOperation;
use super::policy::FallbackPolicy;
use super::policy::SubstitutionDecision;
use super::resources::ContainerResourceView;

/// Result of reviewing one pod. Pods are never rejected, only rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionVerdict {
    pub decisions: Vec<SubstitutionDecision>,
    pub operations: Vec<PatchOperation>,
}

impl AdmissionVerdict {
    pub const fn allowed(&self) -> bool {
        true
    }

    pub fn is_modified(&self) -> bool {
        !self.decisions.is_empty()
    }

    /// The full patch document, if any container was rewritten.
    pub fn patch(&self) -> Option<json_patch::Patch> {
        self.is_modified()
            .then(|| to_json_patch(self.operations.clone()))
    }

    /// Convert into the admission response for `request`.
    ///
    /// A patch that cannot be serialized is never applied partially: the pod
    /// is admitted unmodified and the error is reported in the response.
    pub fn into_response(self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let Some(patch) = self.patch() else {
            return AdmissionResponse::from(request);
        };

        match AdmissionResponse::from(request).with_patch(patch) {
            Ok(response) => response,
            Err(e) => {
                error!(uid = %request.uid, "Could not serialize patch: {e}");
                allow_with_message(request, format!("patch serialization error: {e}"))
            }
        }
    }
}

/// Allowed, unmodified response that still surfaces `message` to the caller.
pub fn allow_with_message(
    request: &AdmissionRequest<DynamicObject>,
    message: impl Into<String>,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);
    response.result.message = message.into();
    response
}

pub struct AdmissionOrchestrator {
    policy: FallbackPolicy,
}

impl AdmissionOrchestrator {
    pub fn new(policy: FallbackPolicy) -> Self {
        Self { policy }
    }

    /// Review every container of `pod` in declared order.
    ///
    /// Container indices in the verdict address `/spec/containers/{i}` of the
    /// pod exactly as it was received.
    #[tracing::instrument(skip_all, fields(namespace = pod_namespace(pod), pod = pod_name(pod)))]
    pub async fn review(&self, pod: &Pod) -> AdmissionVerdict {
        info!("Reviewing pod: {}/{}", pod_namespace(pod), pod_name(pod));

        let containers = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default();

        let mut builder = PatchBuilder::new(pod.metadata.annotations.is_some());
        let mut decisions = Vec::new();
        for (index, container) in containers.iter().enumerate() {
            let view = ContainerResourceView::from_container(container);
            if let Some(decision) = self.policy.decide(index, &view).await {
                builder.push_decision(&decision);
                decisions.push(decision);
            }
        }

        if builder.is_empty() {
            return AdmissionVerdict::default();
        }

        info!(
            substitutions = decisions.len(),
            "Applied fallback patch to pod {}/{}",
            pod_namespace(pod),
            pod_name(pod)
        );
        AdmissionVerdict {
            decisions,
            operations: builder.build(),
        }
    }
}

fn pod_namespace(pod: &Pod) -> &str {
    pod.metadata.namespace.as_deref().unwrap_or_default()
}

/// Pods created by controllers may only carry `generateName` at admission.
fn pod_name(pod: &Pod) -> &str {
    pod.metadata
        .name
        .as_deref()
        .or(pod.metadata.generate_name.as_deref())
        .unwrap_or_default()
}
