use anyhow::Result;
use clap::Parser;
use mig_fallback_webhook::cmd;
use mig_fallback_webhook::config::Cli;
use mig_fallback_webhook::config::Commands;
use mig_fallback_webhook::infrastructure::logging;

#[tokio::main]
async fn main() -> Result<()> {
    logging::setup_panic_hook();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(serve_args) => cmd::run_serve(*serve_args).await,
        Commands::CheckCapacity(check_args) => cmd::run_check_capacity(check_args).await,
    }
}
