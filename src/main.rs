mod cli;

use clap::Parser;
use cli::{Cli, Commands, ServerArgs, WorkerArgs};
use gallery_dl_server::api;
use gallery_dl_server::config::Config;
use gallery_dl_server::logging::LogSink;
use gallery_dl_server::worker::{self, WorkerRequest};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => match serve(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("gallery-dl-server: {e}");
                ExitCode::FAILURE
            }
        },
        Commands::Worker(args) => run_worker(args).await,
    }
}

async fn serve(args: ServerArgs) -> Result<(), AnyError> {
    let mut config = Config::load_reported(args.config)?;
    if let Some(address) = args.address {
        config.server.bind_addr = address;
    }

    let sink = LogSink::init(&config.logging)?;
    api::run(config, sink).await
}

/// Stdout belongs to the record channel, so diagnostics go to stderr
async fn run_worker(args: WorkerArgs) -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let request: WorkerRequest = match serde_json::from_str(&args.request) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Invalid worker request");
            return ExitCode::from(2);
        }
    };

    let code = worker::worker_main(request).await;
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
