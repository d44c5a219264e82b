use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::SupervisorConfig;
use crate::logging::{LogRecord, RecordSink};
use crate::observability::Metrics;
use crate::worker::{WorkerHandle, WorkerLauncher};

use super::models::{Job, JobOptions, JobOutcome};

pub const SUPERVISOR_LOGGER: &str = "supervisor";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("/q called without a 'url' in form data")]
    MissingUrl,
}

/// A job that was accepted and is now running in the background
#[derive(Debug)]
pub struct Submitted {
    pub job: Job,
    pub handle: JoinHandle<JobOutcome>,
}

/// Accepts jobs, starts one worker per job and relays the worker's records
/// to the sink until the worker is gone.
#[derive(Clone)]
pub struct Supervisor {
    launcher: Arc<dyn WorkerLauncher>,
    sink: Arc<dyn RecordSink>,
    settings: Arc<SupervisorConfig>,
    metrics: Arc<Metrics>,
}

impl Supervisor {
    pub fn new(
        launcher: Arc<dyn WorkerLauncher>,
        sink: Arc<dyn RecordSink>,
        settings: SupervisorConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            launcher,
            sink,
            settings: Arc::new(settings),
            metrics,
        }
    }

    /// Validate and start a job. Returns as soon as the job is scheduled;
    /// nothing is launched when validation fails.
    pub fn submit(&self, url: Option<&str>, options: JobOptions) -> Result<Submitted, SubmitError> {
        let url = match url.map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => {
                self.metrics.job_rejected();
                self.log(LogRecord::error(SUPERVISOR_LOGGER, "No URL provided."));
                return Err(SubmitError::MissingUrl);
            }
        };

        let job = Job::new(url, options);
        self.metrics.job_accepted();
        self.log(LogRecord::info(
            SUPERVISOR_LOGGER,
            format!("Added URL to the download queue: {url}"),
        ));

        let supervisor = self.clone();
        let running = job.clone();
        let handle = tokio::spawn(async move { supervisor.supervise(running).await });

        Ok(Submitted { job, handle })
    }

    async fn supervise(self, job: Job) -> JobOutcome {
        let worker = match self.launcher.launch(&job).await {
            Ok(worker) => worker,
            Err(e) => {
                self.metrics.spawn_failed();
                tracing::debug!(job_id = %job.id, error = %e, "Worker launch failed");
                self.log(LogRecord::error(
                    SUPERVISOR_LOGGER,
                    format!("Failed to start download: {e}"),
                ));
                return JobOutcome::SpawnFailed;
            }
        };

        let WorkerHandle {
            mut records,
            mut status,
            mut process,
        } = worker;

        let poll = self.settings.poll_interval.as_duration();
        let mut killed = false;

        loop {
            if records.is_empty() && !process.is_alive() {
                break;
            }

            let record = match timeout(poll, records.recv()).await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                // re-check liveness
                Err(_) => continue,
            };

            if record.level < self.settings.min_level {
                continue;
            }

            let stuck = !killed && record.message.contains(&self.settings.kill_marker);
            self.sink.handle(record);

            if stuck {
                killed = true;
                self.metrics.job_killed();
                self.log(LogRecord::warning(
                    SUPERVISOR_LOGGER,
                    "Terminating process as video is not available",
                ));
                if let Err(e) = process.kill() {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to kill worker");
                }
            }
        }

        let exit = match timeout(self.join_timeout(), process.wait()).await {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                tracing::debug!(job_id = %job.id, error = %e, "Worker wait failed");
                None
            }
            Err(_) => {
                tracing::debug!(job_id = %job.id, "Worker did not finish within the join timeout");
                None
            }
        };
        let code = status.try_recv().ok().or(exit);

        self.report_completion(code, killed)
    }

    fn report_completion(&self, code: Option<i32>, killed: bool) -> JobOutcome {
        if code == Some(0) {
            self.metrics.job_succeeded();
            self.log(LogRecord::info(
                SUPERVISOR_LOGGER,
                "Download process exited successfully",
            ));
        } else {
            self.metrics.job_failed();
            let shown = code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            self.log(LogRecord::error(
                SUPERVISOR_LOGGER,
                format!("Download failed with exit code: {shown}"),
            ));
        }

        match (killed, code) {
            (true, _) => JobOutcome::Killed { code },
            (false, Some(0)) => JobOutcome::Completed,
            (false, _) => JobOutcome::Failed { code },
        }
    }

    fn join_timeout(&self) -> Duration {
        self.settings.join_timeout.as_duration()
    }

    fn log(&self, record: LogRecord) {
        self.sink.handle(record);
    }
}
