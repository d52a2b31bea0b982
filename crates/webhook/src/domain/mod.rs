//! Fallback decision engine and the types it operates on.
//!
//! Nothing in here talks to the cluster directly; capacity is reached through
//! the [`capacity::CapacityInspector`] seam.

pub mod capacity;
pub mod patch;
pub mod policy;
pub mod quantity;
pub mod resources;
pub mod review;
