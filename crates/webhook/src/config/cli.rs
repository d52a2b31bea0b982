use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::config::check::CheckCapacityArgs;
use crate::config::serve::ServeArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the mutating admission webhook server
    Serve(Box<ServeArgs>),
    /// Report GPU availability and the fallback a medium MIG request would take
    #[command(name = "check-capacity")]
    CheckCapacity(CheckCapacityArgs),
}
