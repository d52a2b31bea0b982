//! End-to-end tests for the /mutate endpoint

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use error_stack::Report;
use mig_fallback_webhook::capacity::CapacityError;
use mig_fallback_webhook::capacity::CapacityInspector;
use mig_fallback_webhook::codec::AdmissionCodec;
use mig_fallback_webhook::policy::FallbackPolicy;
use mig_fallback_webhook::resources::GpuResource;
use mig_fallback_webhook::review::AdmissionOrchestrator;
use mig_fallback_webhook::server::routes;
use mig_fallback_webhook::server::WebhookState;
use poem::http::StatusCode;
use poem::test::TestClient;
use serde_json::json;
use serde_json::Value;

const UID: &str = "5f0f6a52-2d1c-4d8e-9a6b-0b3f8d2e7c41";

struct StaticInspector {
    available: HashSet<GpuResource>,
}

#[async_trait]
impl CapacityInspector for StaticInspector {
    async fn is_available(&self, resource: GpuResource) -> Result<bool, Report<CapacityError>> {
        Ok(self.available.contains(&resource))
    }
}

fn client(available: &[GpuResource]) -> TestClient<impl poem::Endpoint> {
    let inspector = Arc::new(StaticInspector {
        available: available.iter().copied().collect(),
    });
    let orchestrator = AdmissionOrchestrator::new(FallbackPolicy::new(inspector));
    let state = Arc::new(WebhookState::new(AdmissionCodec::default(), orchestrator));
    TestClient::new(routes(state))
}

fn gpu_pod(requests: Value) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "trainer", "namespace": "ml"},
        "spec": {"containers": [{
            "name": "main",
            "image": "trainer:latest",
            "resources": {"requests": requests}
        }]}
    })
}

fn review(object: Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": UID,
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "requestKind": {"group": "", "version": "v1", "kind": "Pod"},
            "requestResource": {"group": "", "version": "v1", "resource": "pods"},
            "name": "trainer",
            "namespace": "ml",
            "operation": "CREATE",
            "userInfo": {"username": "system:serviceaccount:ml:trainer"},
            "object": object,
            "oldObject": null,
            "dryRun": false,
            "options": null
        }
    })
}

async fn mutate(client: &TestClient<impl poem::Endpoint>, object: Value) -> Value {
    let resp = client
        .post("/mutate")
        .content_type("application/json")
        .body(serde_json::to_vec(&review(object)).unwrap())
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.json().await.value().deserialize::<Value>()
}

/// Decode the patch of a response review and apply it to `object`.
fn apply_patch(response: &Value, object: &Value) -> Value {
    let bytes = match &response["patch"] {
        Value::String(encoded) => base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .expect("patch should be base64"),
        Value::Array(raw) => raw
            .iter()
            .map(|b| b.as_u64().expect("patch byte") as u8)
            .collect(),
        other => panic!("unexpected patch encoding: {other}"),
    };
    let patch: json_patch::Patch = serde_json::from_slice(&bytes).expect("patch should be JSON");

    let mut patched = object.clone();
    json_patch::patch(&mut patched, &patch).expect("patch should apply");
    patched
}

#[tokio::test]
async fn falls_back_to_small_mig() {
    let client = client(&[GpuResource::SmallMig]);
    let pod = gpu_pod(json!({"nvidia.com/mig-2g.20gb": "1"}));

    let body = mutate(&client, pod.clone()).await;
    let response = &body["response"];

    assert_eq!(body["kind"], "AdmissionReview");
    assert_eq!(response["uid"], UID);
    assert_eq!(response["allowed"], true);
    assert_eq!(response["patchType"], "JSONPatch");

    let patched = apply_patch(response, &pod);
    assert_eq!(
        patched["spec"]["containers"][0]["resources"]["requests"],
        json!({"nvidia.com/mig-1g.10gb": "1"})
    );
    assert_eq!(
        patched["metadata"]["annotations"]["gpu-webhook.k8s.io/fallback"],
        "2g.20gb->1g.10gb"
    );
}

#[tokio::test]
async fn falls_back_to_whole_gpu() {
    let client = client(&[]);
    let pod = gpu_pod(json!({"nvidia.com/mig-2g.20gb": "1"}));

    let body = mutate(&client, pod.clone()).await;
    let patched = apply_patch(&body["response"], &pod);

    assert_eq!(
        patched["spec"]["containers"][0]["resources"]["requests"],
        json!({"nvidia.com/gpu": "1"})
    );
    assert_eq!(
        patched["metadata"]["annotations"]["gpu-webhook.k8s.io/fallback"],
        "2g.20gb->gpu"
    );
}

#[tokio::test]
async fn available_profile_is_admitted_without_patch() {
    let client = client(&[GpuResource::MediumMig]);

    let body = mutate(&client, gpu_pod(json!({"nvidia.com/mig-2g.20gb": "1"}))).await;
    let response = &body["response"];

    assert_eq!(response["uid"], UID);
    assert_eq!(response["allowed"], true);
    assert!(matches!(response.get("patch"), None | Some(Value::Null)));
}

#[tokio::test]
async fn whole_gpu_request_is_admitted_without_patch() {
    let client = client(&[]);

    let body = mutate(&client, gpu_pod(json!({"nvidia.com/gpu": "1"}))).await;

    assert_eq!(body["response"]["allowed"], true);
    assert!(matches!(body["response"].get("patch"), None | Some(Value::Null)));
}

#[tokio::test]
async fn undecodable_pod_is_allowed_with_message() {
    let client = client(&[]);
    let object = json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "trainer"},
        "spec": {"containers": "not-a-list"}
    });

    let body = mutate(&client, object).await;
    let response = &body["response"];

    assert_eq!(response["allowed"], true);
    assert!(response["status"]["message"]
        .as_str()
        .is_some_and(|m| m.contains("Could not decode pod")));
}

#[tokio::test]
async fn wrong_content_type_is_rejected() {
    let client = client(&[]);

    let resp = client
        .post("/mutate")
        .content_type("text/plain")
        .body(serde_json::to_vec(&review(gpu_pod(json!({})))).unwrap())
        .send()
        .await;

    resp.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    resp.assert_text("contentType=text/plain, expect application/json")
        .await;
}

#[tokio::test]
async fn malformed_review_yields_invalid_response() {
    let client = client(&[]);

    let resp = client
        .post("/mutate")
        .content_type("application/json")
        .body("{not json")
        .send()
        .await;
    resp.assert_status_is_ok();
    let body: Value = resp.json().await.value().deserialize();

    assert_eq!(body["response"]["allowed"], false);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let client = client(&[]);

    let resp = client.get("/healthz").send().await;

    resp.assert_status_is_ok();
    resp.assert_text("ok").await;
}
