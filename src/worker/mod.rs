//! Download Worker
//!
//! A worker runs exactly one job: it reloads the downloader configuration,
//! applies the job's overrides, runs the downloader and reports every line of
//! output as a [`LogRecord`](crate::logging::LogRecord) followed by an exit
//! code. In production each worker is a separate process started by
//! [`ProcessLauncher`] and speaking the [`channel`] protocol on stdout.

pub mod channel;
pub mod overrides;
pub mod process;
pub mod runner;
pub mod tool;

pub use channel::{ChannelWriter, WorkerMessage};
pub use process::{
    InProcessLauncher, KILLED, ProcessLauncher, SpawnError, WorkerHandle, WorkerLauncher,
    WorkerProcess,
};
pub use runner::run_worker;
pub use tool::{DownloadTool, GalleryDl};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::DownloaderConfig;
use crate::jobs::Job;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write downloader configuration: {0}")]
    ConfigWrite(#[source] std::io::Error),

    #[error("failed to read downloader output: {0}")]
    Output(#[source] std::io::Error),
}

/// What a worker process receives on its command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub job: Job,
    pub downloader: DownloaderConfig,
}

/// Entry point of the `worker` subcommand. Stdout carries the record channel,
/// so nothing else may write to it.
pub async fn worker_main(request: WorkerRequest) -> i32 {
    let (tx, rx) = mpsc::unbounded_channel();
    let forward = tokio::spawn(async move {
        let mut writer = ChannelWriter::new(tokio::io::stdout());
        let drained = writer.drain(rx).await;
        (writer, drained)
    });

    let tool = GalleryDl::new(&request.downloader);
    let code = run_worker(&request, &tool, &tx).await;
    drop(tx);

    match forward.await {
        Ok((mut writer, Ok(()))) => {
            if let Err(e) = writer.send(&WorkerMessage::Exit { code }).await {
                tracing::error!(error = %e, "Failed to report exit code");
            }
        }
        Ok((_, Err(e))) => tracing::error!(error = %e, "Record channel closed early"),
        Err(e) => tracing::error!(error = %e, "Record forwarder panicked"),
    }

    code
}
