use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::Container;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::warn;

use super::quantity::ResourceQuantity;

/// 2-slice MIG partition.
pub const MIG_2G_20GB: &str = "nvidia.com/mig-2g.20gb";
/// 1-slice MIG partition.
pub const MIG_1G_10GB: &str = "nvidia.com/mig-1g.10gb";
/// Undivided GPU.
pub const WHOLE_GPU: &str = "nvidia.com/gpu";

/// GPU resources the webhook knows how to reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GpuResource {
    MediumMig,
    SmallMig,
    WholeGpu,
}

impl GpuResource {
    pub const ALL: [GpuResource; 3] = [Self::MediumMig, Self::SmallMig, Self::WholeGpu];

    /// Extended resource name as it appears in pod specs and node status.
    pub const fn resource_name(self) -> &'static str {
        match self {
            Self::MediumMig => MIG_2G_20GB,
            Self::SmallMig => MIG_1G_10GB,
            Self::WholeGpu => WHOLE_GPU,
        }
    }

    pub fn from_resource_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|resource| resource.resource_name() == name)
    }
}

impl fmt::Display for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

/// GPU requests and limits of a single container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerResourceView {
    pub requests: BTreeMap<GpuResource, ResourceQuantity>,
    pub limits: BTreeMap<GpuResource, ResourceQuantity>,
}

impl ContainerResourceView {
    /// Extract the GPU subset of a container's resources.
    ///
    /// Non-GPU resources are ignored; GPU quantities that fail to parse are
    /// logged and treated as absent.
    pub fn from_container(container: &Container) -> Self {
        let resources = container.resources.as_ref();
        Self {
            requests: gpu_quantities(
                &container.name,
                resources.and_then(|r| r.requests.as_ref()),
            ),
            limits: gpu_quantities(&container.name, resources.and_then(|r| r.limits.as_ref())),
        }
    }

    pub fn request(&self, resource: GpuResource) -> Option<&ResourceQuantity> {
        self.requests.get(&resource)
    }

    pub fn limit(&self, resource: GpuResource) -> Option<&ResourceQuantity> {
        self.limits.get(&resource)
    }
}

fn gpu_quantities(
    container: &str,
    quantities: Option<&BTreeMap<String, Quantity>>,
) -> BTreeMap<GpuResource, ResourceQuantity> {
    let Some(quantities) = quantities else {
        return BTreeMap::new();
    };

    quantities
        .iter()
        .filter_map(|(name, quantity)| {
            let resource = GpuResource::from_resource_name(name)?;
            match ResourceQuantity::try_from(quantity) {
                Ok(parsed) => Some((resource, parsed)),
                Err(e) => {
                    warn!(
                        container = container,
                        resource = name.as_str(),
                        value = quantity.0.as_str(),
                        "Ignoring unparsable GPU quantity: {e}"
                    );
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ResourceRequirements;

    use super::*;

    fn container(requests: &[(&str, &str)], limits: Option<&[(&str, &str)]>) -> Container {
        let to_map = |entries: &[(&str, &str)]| {
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
                .collect::<BTreeMap<_, _>>()
        };
        Container {
            name: "main".to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(to_map(requests)),
                limits: limits.map(to_map),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn resource_names_round_trip() {
        for resource in GpuResource::ALL {
            assert_eq!(
                GpuResource::from_resource_name(resource.resource_name()),
                Some(resource)
            );
        }
        assert_eq!(GpuResource::from_resource_name("cpu"), None);
    }

    #[test]
    fn view_keeps_only_gpu_resources() {
        let view = ContainerResourceView::from_container(&container(
            &[("cpu", "500m"), (MIG_2G_20GB, "1")],
            Some(&[(MIG_2G_20GB, "1"), ("memory", "1Gi")]),
        ));

        assert_eq!(view.requests.len(), 1);
        assert_eq!(
            view.request(GpuResource::MediumMig),
            Some(&ResourceQuantity::from_units(1))
        );
        assert_eq!(
            view.limit(GpuResource::MediumMig),
            Some(&ResourceQuantity::from_units(1))
        );
        assert_eq!(view.limits.len(), 1);
    }

    #[test]
    fn view_skips_unparsable_quantities() {
        let view = ContainerResourceView::from_container(&container(
            &[(MIG_2G_20GB, "lots"), (WHOLE_GPU, "2")],
            None,
        ));

        assert_eq!(view.request(GpuResource::MediumMig), None);
        assert_eq!(
            view.request(GpuResource::WholeGpu),
            Some(&ResourceQuantity::from_units(2))
        );
        assert!(view.limits.is_empty());
    }

    #[test]
    fn container_without_resources_has_empty_view() {
        let view = ContainerResourceView::from_container(&Container::default());
        assert_eq!(view, ContainerResourceView::default());
    }
}
