use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gallery-dl-server")]
#[command(about = "Web front end and job runner for gallery-dl", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),

    /// Run a single download job (started by the server)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to; overrides the configured one
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file; overrides GDL_SERVER_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct WorkerArgs {
    /// JSON-encoded worker request
    #[arg(long)]
    pub request: String,
}
