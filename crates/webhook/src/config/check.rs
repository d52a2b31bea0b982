use clap::Parser;

use crate::config::cluster::ClusterArgs;

#[derive(Parser, Debug, Clone)]
pub struct CheckCapacityArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,
}
