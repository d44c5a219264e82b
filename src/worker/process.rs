//! Launching workers and supervising their processes
//!
//! The production launcher re-executes the current binary with the hidden
//! `worker` subcommand, so every job gets its own OS process and its own copy
//! of the downloader configuration. [`InProcessLauncher`] runs the same logic
//! on a tokio task instead.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::DownloaderConfig;
use crate::jobs::Job;
use crate::logging::LogRecord;

use super::channel::demux;
use super::runner::run_worker;
use super::tool::{DownloadTool, exit_code};
use super::WorkerRequest;

/// Exit code reported for a worker that was killed before it could report one
pub const KILLED: i32 = -9;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to encode worker request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to start worker process: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker process has no stdout")]
    MissingPipe,
}

/// A running worker, as seen by the supervisor
#[async_trait]
pub trait WorkerProcess: Send {
    /// True until the worker has exited and its output has been consumed
    fn is_alive(&mut self) -> bool;

    /// Request immediate termination. Does not wait.
    fn kill(&mut self) -> std::io::Result<()>;

    /// Wait for exit. `None` when no exit code is available.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;
}

/// Everything the supervisor holds for one job
pub struct WorkerHandle {
    pub records: mpsc::UnboundedReceiver<LogRecord>,
    pub status: oneshot::Receiver<i32>,
    pub process: Box<dyn WorkerProcess>,
}

#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, job: &Job) -> Result<WorkerHandle, SpawnError>;
}

/// Spawns `<program> worker --request <json>` per job
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    downloader: DownloaderConfig,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, downloader: DownloaderConfig) -> Self {
        Self {
            program: program.into(),
            downloader,
        }
    }

    /// Launch workers from the running executable
    pub fn current_exe(downloader: DownloaderConfig) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, downloader))
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, job: &Job) -> Result<WorkerHandle, SpawnError> {
        let request = serde_json::to_string(&WorkerRequest {
            job: job.clone(),
            downloader: self.downloader.clone(),
        })?;

        let mut child = Command::new(&self.program)
            .arg("worker")
            .arg("--request")
            .arg(request)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe)?;
        let (records, status, reader) = demux(BufReader::new(stdout));

        tracing::debug!(job_id = %job.id, pid = ?child.id(), "Worker process started");

        Ok(WorkerHandle {
            records,
            status,
            process: Box::new(ChildWorker { child, reader }),
        })
    }
}

struct ChildWorker {
    child: Child,
    reader: JoinHandle<()>,
}

#[async_trait]
impl WorkerProcess for ChildWorker {
    fn is_alive(&mut self) -> bool {
        let running = matches!(self.child.try_wait(), Ok(None));
        running || !self.reader.is_finished()
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(exit_code(status))
    }
}

/// Runs jobs on tokio tasks inside the server process, with a caller-chosen tool
#[derive(Clone)]
pub struct InProcessLauncher {
    tool: Arc<dyn DownloadTool>,
    downloader: DownloaderConfig,
}

impl InProcessLauncher {
    pub fn new(tool: Arc<dyn DownloadTool>, downloader: DownloaderConfig) -> Self {
        Self { tool, downloader }
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    async fn launch(&self, job: &Job) -> Result<WorkerHandle, SpawnError> {
        let (record_tx, records) = mpsc::unbounded_channel();
        let (status_tx, status) = oneshot::channel();

        let request = WorkerRequest {
            job: job.clone(),
            downloader: self.downloader.clone(),
        };
        let tool = self.tool.clone();

        let task = tokio::spawn(async move {
            let code = run_worker(&request, tool.as_ref(), &record_tx).await;
            let _ = status_tx.send(code);
            code
        });

        Ok(WorkerHandle {
            records,
            status,
            process: Box::new(TaskWorker { task, exit: None }),
        })
    }
}

struct TaskWorker {
    task: JoinHandle<i32>,
    exit: Option<Option<i32>>,
}

#[async_trait]
impl WorkerProcess for TaskWorker {
    fn is_alive(&mut self) -> bool {
        !self.task.is_finished()
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.task.abort();
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let exit = match (&mut self.task).await {
            Ok(code) => Some(code),
            Err(e) if e.is_cancelled() => Some(KILLED),
            Err(_) => None,
        };
        self.exit = Some(exit);
        Ok(exit)
    }
}
