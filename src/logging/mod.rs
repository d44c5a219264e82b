//! Log Sink: the process-wide logger and the single log file it writes.
//!
//! Everything logged with `tracing` in the server process ends up in three
//! places: the log file, stdout (below WARNING) and stderr (WARNING and
//! above). Records relayed from worker processes re-enter through
//! [`RecordSink::handle`] at their original level.
//!
//! The subscriber is installed once by [`LogSink::init`]; later calls return
//! the same sink. [`LogSink::shutdown`] flushes the file and optionally
//! archives a copy.

mod file;
mod format;
mod record;

pub use file::{LOG_EMPTY, LOG_NOT_FOUND, LogFile, LogFileError};
pub use format::{LineFormat, TIME_FORMAT};
pub use record::{Level, LogRecord};

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use crate::config::LoggingConfig;

const RELAY_TARGET: &str = "gallery_dl_server::relay";

/// Destination for [`LogRecord`]s coming out of a job
pub trait RecordSink: Send + Sync {
    fn handle(&self, record: LogRecord);
}

impl<S: RecordSink + ?Sized> RecordSink for &S {
    fn handle(&self, record: LogRecord) {
        (**self).handle(record)
    }
}

/// Re-emit a record as a native `tracing` event, keeping its level so the
/// subscriber's level filtering still applies.
pub fn emit(record: &LogRecord) {
    let ts = record.timestamp.timestamp_millis();
    let logger = record.logger.as_str();
    let message = record.message.as_str();

    match record.level {
        Level::Debug => {
            tracing::debug!(target: RELAY_TARGET, record_ts = ts, logger = logger, "{message}")
        }
        Level::Info => {
            tracing::info!(target: RELAY_TARGET, record_ts = ts, logger = logger, "{message}")
        }
        Level::Warning => {
            tracing::warn!(target: RELAY_TARGET, record_ts = ts, logger = logger, "{message}")
        }
        Level::Error => {
            tracing::error!(target: RELAY_TARGET, record_ts = ts, logger = logger, "{message}")
        }
    }
}

static SINK: OnceLock<LogSink> = OnceLock::new();

pub struct LogSink {
    file: LogFile,
    writer: Arc<File>,
    archive_dir: Option<PathBuf>,
    closed: AtomicBool,
}

impl LogSink {
    /// Install the process-wide subscriber. Repeated calls are no-ops that
    /// return the sink created by the first one.
    pub fn init(config: &LoggingConfig) -> Result<&'static LogSink, LogFileError> {
        if let Some(sink) = SINK.get() {
            return Ok(sink);
        }

        let file = LogFile::new(&config.file);
        let writer = Arc::new(file.open_append()?);
        let candidate = LogSink {
            file,
            writer,
            archive_dir: config.archive_dir.clone(),
            closed: AtomicBool::new(false),
        };

        let mut installed = false;
        let sink = SINK.get_or_init(|| {
            installed = true;
            candidate
        });

        if installed {
            install_subscriber(&config.level, sink.writer.clone());
            tracing::debug!(path = %sink.file.path().display(), "Log sink initialised");
        }

        Ok(sink)
    }

    pub fn file(&self) -> &LogFile {
        &self.file
    }

    /// Flush the log file and archive a copy when configured. Archive
    /// failures are swallowed. Runs at most once.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.writer.sync_all();

        if let Some(dir) = &self.archive_dir {
            match self.file.archive_to(dir) {
                Ok(Some(copy)) => tracing::debug!(path = %copy.display(), "Archived log file"),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "Log archive skipped"),
            }
        }
    }
}

impl RecordSink for LogSink {
    fn handle(&self, record: LogRecord) {
        emit(&record);
    }
}

fn install_subscriber(level: &str, writer: Arc<File>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = fmt::layer().event_format(LineFormat).with_writer(writer);
    let stdout_layer = fmt::layer()
        .event_format(LineFormat)
        .with_writer(std::io::stdout)
        .with_filter(filter_fn(|meta| *meta.level() > tracing::Level::WARN));
    let stderr_layer = fmt::layer()
        .event_format(LineFormat)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(|meta| *meta.level() <= tracing::Level::WARN));

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .with(stderr_layer)
        .try_init()
    {
        eprintln!("global tracing subscriber already set: {e}");
    }
}
