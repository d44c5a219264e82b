use futures::Stream;
use std::sync::Arc;

use crate::config::Config;
use crate::jobs::{Job, JobOptions, SubmitError, Supervisor, spawn_update};
use crate::logging::{LogFile, LogFileError, RecordSink};
use crate::observability::Metrics;
use crate::tail::{self, ViewerConnection, ViewerRegistry};
use crate::worker::WorkerLauncher;

/// Shared state behind every route. The methods here are the whole core
/// surface the HTTP layer talks to.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub supervisor: Supervisor,
    pub log_file: LogFile,
    pub viewers: Arc<ViewerRegistry>,
    pub metrics: Arc<Metrics>,
    sink: Arc<dyn RecordSink>,
}

impl AppState {
    pub fn new(config: Config, launcher: Arc<dyn WorkerLauncher>, sink: Arc<dyn RecordSink>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let supervisor = Supervisor::new(launcher, sink.clone(), config.supervisor.clone(), metrics.clone());

        Self {
            log_file: LogFile::new(&config.logging.file),
            config: Arc::new(config),
            supervisor,
            viewers: Arc::new(ViewerRegistry::new()),
            metrics,
            sink,
        }
    }

    /// Fire-and-forget: the job runs in the background once accepted
    pub fn submit_job(&self, url: Option<&str>, options: JobOptions) -> Result<Job, SubmitError> {
        self.supervisor.submit(url, options).map(|submitted| submitted.job)
    }

    /// Fire-and-forget package upgrade; results land in the log
    pub fn update_packages(&self) {
        spawn_update(self.config.downloader.update_commands.clone(), self.sink.clone());
    }

    pub async fn get_full_log(&self) -> String {
        self.log_file.full_log().await
    }

    pub async fn clear_log(&self) -> Result<(), LogFileError> {
        self.log_file.clear().await
    }

    pub fn stream_log(&self) -> impl Stream<Item = String> + Send + 'static {
        tail::stream_log(
            self.log_file.path().to_path_buf(),
            self.config.tail.stream_chunk.as_usize(),
            self.config.logging.crlf_stream,
        )
    }

    /// Runs until the viewer disconnects
    pub async fn tail_log_socket<C: ViewerConnection>(&self, conn: C) {
        tail::tail_log(conn, self.log_file.path(), &self.config.tail, &self.viewers).await
    }
}
