//! Cluster capacity queries used by the fallback policy

use async_trait::async_trait;
use error_stack::Report;
use thiserror::Error;

use super::resources::GpuResource;

/// Errors that can occur while inspecting cluster capacity.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("Failed to list nodes while checking {resource}")]
    ListFailed { resource: GpuResource },
    #[error("Node listing timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Reports whether a resource is allocatable anywhere in the cluster.
///
/// Every call reflects a fresh snapshot; implementations must not cache.
#[async_trait]
pub trait CapacityInspector: Send + Sync {
    /// `Ok(true)` iff at least one node has one or more allocatable units.
    async fn is_available(&self, resource: GpuResource) -> Result<bool, Report<CapacityError>>;
}
