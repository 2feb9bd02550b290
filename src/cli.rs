use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "reactorcide")]
#[command(about = "reactorcide CI/CD job coordinator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API alongside an in-process worker pool
    Serve(ServeArgs),

    /// Run only the job worker pool, with no HTTP server
    Worker,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Overrides the configured bind address (REACTORCIDE__SERVER__BIND_ADDR)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
