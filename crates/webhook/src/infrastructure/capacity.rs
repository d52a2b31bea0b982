//! Capacity inspection backed by the Kubernetes node list.

use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::Api;
use kube::Client;
use tracing::debug;

use crate::domain::capacity::CapacityError;
use crate::domain::capacity::CapacityInspector;
use crate::domain::quantity::ResourceQuantity;
use crate::domain::resources::GpuResource;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lists every node on each query; nothing is cached between calls.
#[derive(Clone)]
pub struct KubeCapacityInspector {
    client: Client,
    timeout: Duration,
}

impl KubeCapacityInspector {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl CapacityInspector for KubeCapacityInspector {
    #[tracing::instrument(skip_all, fields(resource = %resource))]
    async fn is_available(&self, resource: GpuResource) -> Result<bool, Report<CapacityError>> {
        let api: Api<Node> = Api::all(self.client.clone());

        let nodes = tokio::time::timeout(self.timeout, api.list(&ListParams::default()))
            .await
            .map_err(|_| {
                Report::new(CapacityError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            })?
            .change_context(CapacityError::ListFailed { resource })?;

        let available = nodes
            .items
            .iter()
            .any(|node| node_has_allocatable(node, resource));
        debug!(nodes = nodes.items.len(), available, "Checked allocatable capacity");
        Ok(available)
    }
}

/// Whether `node` reports at least one allocatable unit of `resource`.
pub fn node_has_allocatable(node: &Node, resource: GpuResource) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.allocatable.as_ref())
        .and_then(|allocatable| allocatable.get(resource.resource_name()))
        .and_then(|quantity| ResourceQuantity::try_from(quantity).ok())
        .is_some_and(|quantity| quantity.is_at_least(1))
}
