use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::infrastructure::capacity::DEFAULT_QUERY_TIMEOUT;

/// Settings for reaching the cluster API.
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "CAPACITY_QUERY_TIMEOUT_MS",
        default_value_t = DEFAULT_QUERY_TIMEOUT.as_millis() as u64,
        help = "Timeout for each node listing; a timed out query counts as unavailable"
    )]
    pub capacity_timeout_ms: u64,
}

impl ClusterArgs {
    pub const fn capacity_timeout(&self) -> Duration {
        Duration::from_millis(self.capacity_timeout_ms)
    }
}
