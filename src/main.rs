mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use reactorcide::api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => api::run(args.address).await?,
        Commands::Worker => api::run_worker_only().await?,
    }

    Ok(())
}
