//! Fallback decision engine.
//!
//! A pod asking for a MIG profile that no node can currently offer is steered
//! to the next profile down a fixed chain. The chain is plain data: each rung
//! names the replacement resource, the provenance label recorded on the pod,
//! and whether the rung needs to be confirmed against cluster capacity first.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::info;

use super::capacity::CapacityInspector;
use super::quantity::ResourceQuantity;
use super::resources::ContainerResourceView;
use super::resources::GpuResource;

/// Provenance recorded on a pod whose GPU request was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackLabel {
    MediumToSmall,
    MediumToWhole,
}

impl FallbackLabel {
    /// Annotation value; consumers match on these strings verbatim.
    pub const fn annotation_value(self) -> &'static str {
        match self {
            Self::MediumToSmall => "2g.20gb->1g.10gb",
            Self::MediumToWhole => "2g.20gb->gpu",
        }
    }
}

impl fmt::Display for FallbackLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.annotation_value())
    }
}

/// How a rung is confirmed before it is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RungCheck {
    /// Taken only if the cluster reports allocatable capacity.
    Probe,
    /// Terminal rung, taken without asking the cluster.
    Unconditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackRung {
    pub replacement: GpuResource,
    pub label: FallbackLabel,
    pub check: RungCheck,
}

/// Ordered substitutes for a source resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackChain {
    pub source: GpuResource,
    pub rungs: &'static [FallbackRung],
}

/// medium-MIG -> small-MIG -> whole GPU.
///
/// Whole GPUs are never probed. Whether they should be is an open product
/// question; until then the last rung always succeeds.
pub const MEDIUM_MIG_CHAIN: FallbackChain = FallbackChain {
    source: GpuResource::MediumMig,
    rungs: &[
        FallbackRung {
            replacement: GpuResource::SmallMig,
            label: FallbackLabel::MediumToSmall,
            check: RungCheck::Probe,
        },
        FallbackRung {
            replacement: GpuResource::WholeGpu,
            label: FallbackLabel::MediumToWhole,
            check: RungCheck::Unconditional,
        },
    ],
};

/// Outcome of the policy for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionDecision {
    pub container_index: usize,
    pub original: GpuResource,
    pub replacement: GpuResource,
    pub label: FallbackLabel,
    /// Requested quantity of `original`, carried over unchanged.
    pub request: ResourceQuantity,
    /// Limit of `original`, when the container declared one.
    pub limit: Option<ResourceQuantity>,
}

pub struct FallbackPolicy {
    inspector: Arc<dyn CapacityInspector>,
    chain: FallbackChain,
}

impl FallbackPolicy {
    pub fn new(inspector: Arc<dyn CapacityInspector>) -> Self {
        Self::with_chain(inspector, MEDIUM_MIG_CHAIN)
    }

    pub fn with_chain(inspector: Arc<dyn CapacityInspector>, chain: FallbackChain) -> Self {
        Self { inspector, chain }
    }

    pub const fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Decide whether the container at `container_index` needs a substitute.
    ///
    /// Only a non-zero request for the chain's source resource is evaluated;
    /// every other container passes through untouched.
    pub async fn decide(
        &self,
        container_index: usize,
        view: &ContainerResourceView,
    ) -> Option<SubstitutionDecision> {
        let source = self.chain.source;
        let request = *view.request(source).filter(|q| !q.is_zero())?;

        if self.available(source).await {
            debug!(container_index, resource = %source, "Requested resource is available");
            return None;
        }

        for rung in self.chain.rungs {
            let taken = match rung.check {
                RungCheck::Probe => self.available(rung.replacement).await,
                RungCheck::Unconditional => true,
            };
            if !taken {
                continue;
            }

            info!(
                container_index,
                original = %source,
                replacement = %rung.replacement,
                "{source} not available, falling back to {}",
                rung.replacement
            );
            return Some(SubstitutionDecision {
                container_index,
                original: source,
                replacement: rung.replacement,
                label: rung.label,
                request,
                limit: view.limit(source).copied(),
            });
        }

        info!(
            container_index,
            resource = %source,
            "No fallback rung available, leaving request unchanged"
        );
        None
    }

    /// Query errors count as "unavailable" so the chain falls further down
    /// rather than promising capacity it could not confirm.
    async fn available(&self, resource: GpuResource) -> bool {
        match self.inspector.is_available(resource).await {
            Ok(available) => available,
            Err(e) => {
                error!(resource = %resource, "Error checking GPU availability: {e:?}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::domain::capacity::fake::FakeInspector;

    fn view(request: Option<i64>, limit: Option<i64>) -> ContainerResourceView {
        let mut view = ContainerResourceView::default();
        if let Some(units) = request {
            view.requests
                .insert(GpuResource::MediumMig, ResourceQuantity::from_units(units));
        }
        if let Some(units) = limit {
            view.limits
                .insert(GpuResource::MediumMig, ResourceQuantity::from_units(units));
        }
        view
    }

    fn policy(inspector: &Arc<FakeInspector>) -> FallbackPolicy {
        FallbackPolicy::new(inspector.clone())
    }

    #[test(tokio::test)]
    async fn no_substitution_when_medium_available() {
        let inspector = Arc::new(FakeInspector::with_available(&[GpuResource::MediumMig]));

        let decision = policy(&inspector).decide(0, &view(Some(1), None)).await;

        assert_eq!(decision, None);
        assert_eq!(inspector.queries(), vec![GpuResource::MediumMig]);
    }

    #[test(tokio::test)]
    async fn falls_back_to_small_mig() {
        let inspector = Arc::new(FakeInspector::with_available(&[GpuResource::SmallMig]));

        let decision = policy(&inspector)
            .decide(2, &view(Some(1), Some(1)))
            .await
            .expect("should substitute");

        assert_eq!(
            decision,
            SubstitutionDecision {
                container_index: 2,
                original: GpuResource::MediumMig,
                replacement: GpuResource::SmallMig,
                label: FallbackLabel::MediumToSmall,
                request: ResourceQuantity::from_units(1),
                limit: Some(ResourceQuantity::from_units(1)),
            }
        );
    }

    #[test(tokio::test)]
    async fn falls_back_to_whole_gpu_without_probing_it() {
        let inspector = Arc::new(FakeInspector::default());

        let decision = policy(&inspector)
            .decide(0, &view(Some(3), None))
            .await
            .expect("should substitute");

        assert_eq!(decision.replacement, GpuResource::WholeGpu);
        assert_eq!(decision.label, FallbackLabel::MediumToWhole);
        assert_eq!(decision.request, ResourceQuantity::from_units(3));
        assert_eq!(decision.limit, None);
        assert_eq!(
            inspector.queries(),
            vec![GpuResource::MediumMig, GpuResource::SmallMig]
        );
    }

    #[test(tokio::test)]
    async fn query_errors_count_as_unavailable() {
        let inspector = Arc::new(
            FakeInspector::with_available(&[GpuResource::MediumMig, GpuResource::SmallMig])
                .failing_on(&[GpuResource::MediumMig]),
        );

        let decision = policy(&inspector)
            .decide(0, &view(Some(1), None))
            .await
            .expect("should substitute");

        assert_eq!(decision.replacement, GpuResource::SmallMig);
    }

    #[test(tokio::test)]
    async fn zero_or_missing_request_is_not_evaluated() {
        let inspector = Arc::new(FakeInspector::default());
        let policy = policy(&inspector);

        assert_eq!(policy.decide(0, &view(Some(0), Some(1))).await, None);
        assert_eq!(policy.decide(0, &view(None, Some(1))).await, None);
        assert!(inspector.queries().is_empty());
    }

    #[test(tokio::test)]
    async fn other_gpu_resources_pass_through() {
        let inspector = Arc::new(FakeInspector::default());
        let mut view = ContainerResourceView::default();
        view.requests
            .insert(GpuResource::WholeGpu, ResourceQuantity::from_units(1));
        view.requests
            .insert(GpuResource::SmallMig, ResourceQuantity::from_units(1));

        assert_eq!(policy(&inspector).decide(0, &view).await, None);
        assert!(inspector.queries().is_empty());
    }

    #[test(tokio::test)]
    async fn exhausted_chain_leaves_request_unchanged() {
        const PROBE_ONLY: FallbackChain = FallbackChain {
            source: GpuResource::MediumMig,
            rungs: &[FallbackRung {
                replacement: GpuResource::SmallMig,
                label: FallbackLabel::MediumToSmall,
                check: RungCheck::Probe,
            }],
        };
        let inspector = Arc::new(FakeInspector::default());
        let policy = FallbackPolicy::with_chain(inspector.clone(), PROBE_ONLY);

        assert_eq!(policy.decide(0, &view(Some(1), None)).await, None);
    }

    #[test]
    fn labels_match_annotation_contract() {
        assert_eq!(FallbackLabel::MediumToSmall.to_string(), "2g.20gb->1g.10gb");
        assert_eq!(FallbackLabel::MediumToWhole.to_string(), "2g.20gb->gpu");
    }
}
