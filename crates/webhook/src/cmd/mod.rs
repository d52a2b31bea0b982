//! Command layer - Entry points for the webhook binary

pub mod check;
pub mod serve;

pub use check::run_check_capacity;
pub use serve::run_serve;
