pub mod cmd;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export main modules
pub use domain::capacity;
pub use domain::patch;
pub use domain::policy;
pub use domain::quantity;
pub use domain::resources;
pub use domain::review;
pub use infrastructure::codec;
pub use infrastructure::server;
