pub mod check;
pub mod cli;
pub mod cluster;
pub mod serve;

pub use check::*;
pub use cli::*;
pub use cluster::*;
pub use serve::*;
