//! JSON Patch (RFC 6902) construction for substitution decisions.
//!
//! Paths are held as [`PointerBuf`] and only rendered to pointer strings when
//! converted into [`json_patch`] operations.

use jsonptr::PointerBuf;
use serde_json::Value;

use super::policy::SubstitutionDecision;
use super::quantity::ResourceQuantity;
use super::resources::GpuResource;

/// Annotation recording which fallback rung rewrote the pod.
pub const FALLBACK_ANNOTATION: &str = "gpu-webhook.k8s.io/fallback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOperation {
    Add { path: PointerBuf, value: Value },
    Remove { path: PointerBuf },
}

impl PatchOperation {
    pub const fn path(&self) -> &PointerBuf {
        match self {
            Self::Add { path, .. } | Self::Remove { path } => path,
        }
    }
}

impl From<PatchOperation> for json_patch::PatchOperation {
    fn from(op: PatchOperation) -> Self {
        match op {
            PatchOperation::Add { path, value } => {
                json_patch::PatchOperation::Add(json_patch::AddOperation {
                    path: path.to_string(),
                    value,
                })
            }
            PatchOperation::Remove { path } => {
                json_patch::PatchOperation::Remove(json_patch::RemoveOperation {
                    path: path.to_string(),
                })
            }
        }
    }
}

/// Render operations as a single wire-format patch document.
pub fn to_json_patch(operations: Vec<PatchOperation>) -> json_patch::Patch {
    json_patch::Patch(operations.into_iter().map(Into::into).collect())
}

#[derive(Debug, Clone, Copy)]
enum ResourceList {
    Requests,
    Limits,
}

impl ResourceList {
    const fn key(self) -> &'static str {
        match self {
            Self::Requests => "requests",
            Self::Limits => "limits",
        }
    }
}

/// Accumulates the patch for one pod across all of its decisions.
#[derive(Debug)]
pub struct PatchBuilder {
    annotations_present: bool,
    operations: Vec<PatchOperation>,
}

impl PatchBuilder {
    /// `annotations_present` reports whether the pod already carries a
    /// `metadata.annotations` map.
    pub const fn new(annotations_present: bool) -> Self {
        Self {
            annotations_present,
            operations: Vec::new(),
        }
    }

    /// Append the operations for one decision.
    pub fn push_decision(&mut self, decision: &SubstitutionDecision) -> &mut Self {
        self.swap_resource(decision, ResourceList::Requests, &decision.request);
        if let Some(limit) = &decision.limit {
            self.swap_resource(decision, ResourceList::Limits, limit);
        }
        self.annotate(FALLBACK_ANNOTATION, decision.label.annotation_value());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    pub fn build(self) -> Vec<PatchOperation> {
        self.operations
    }

    /// Remove `original` and add `replacement` with the same quantity.
    ///
    /// An existing entry for `replacement` in the same list is overwritten,
    /// not summed.
    fn swap_resource(
        &mut self,
        decision: &SubstitutionDecision,
        list: ResourceList,
        quantity: &ResourceQuantity,
    ) {
        self.operations.push(PatchOperation::Remove {
            path: resource_path(decision.container_index, list, decision.original),
        });
        self.operations.push(PatchOperation::Add {
            path: resource_path(decision.container_index, list, decision.replacement),
            value: Value::String(quantity.to_string()),
        });
    }

    fn annotate(&mut self, key: &str, value: &str) {
        if !self.annotations_present {
            self.operations.push(PatchOperation::Add {
                path: PointerBuf::from_tokens(["metadata", "annotations"]),
                value: Value::Object(serde_json::Map::new()),
            });
            self.annotations_present = true;
        }
        self.operations.push(PatchOperation::Add {
            path: PointerBuf::from_tokens(["metadata", "annotations", key]),
            value: Value::String(value.to_string()),
        });
    }
}

fn resource_path(container_index: usize, list: ResourceList, resource: GpuResource) -> PointerBuf {
    let index = container_index.to_string();
    PointerBuf::from_tokens([
        "spec",
        "containers",
        index.as_str(),
        "resources",
        list.key(),
        resource.resource_name(),
    ])
}
