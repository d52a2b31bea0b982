use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing::warn;

use crate::config::CheckCapacityArgs;
use crate::domain::capacity::CapacityInspector;
use crate::domain::policy::FallbackPolicy;
use crate::domain::quantity::ResourceQuantity;
use crate::domain::resources::ContainerResourceView;
use crate::domain::resources::GpuResource;
use crate::infrastructure::capacity::KubeCapacityInspector;
use crate::infrastructure::kube_client;
use crate::infrastructure::logging;

pub async fn run_check_capacity(args: CheckCapacityArgs) -> Result<()> {
    logging::init();

    let client = kube_client::init_kube_client(args.cluster.kubeconfig.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {e:?}"))?;
    let inspector = Arc::new(KubeCapacityInspector::new(
        client,
        args.cluster.capacity_timeout(),
    ));

    for resource in GpuResource::ALL {
        match inspector.is_available(resource).await {
            Ok(available) => info!(resource = %resource, available, "Cluster capacity"),
            Err(e) => warn!(resource = %resource, "Capacity query failed: {e:?}"),
        }
    }

    let policy = FallbackPolicy::new(inspector);
    let source = policy.chain().source;
    let mut view = ContainerResourceView::default();
    view.requests.insert(source, ResourceQuantity::from_units(1));

    match policy.decide(0, &view).await {
        Some(decision) => info!(
            replacement = %decision.replacement,
            label = %decision.label,
            "A {source} request would currently fall back"
        ),
        None => info!("A {source} request would currently be admitted unchanged"),
    }

    Ok(())
}
