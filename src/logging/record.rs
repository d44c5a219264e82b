//! Structured log records that cross the worker process boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a [`LogRecord`], ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[serde(alias = "debug")]
    Debug,
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "warning", alias = "warn", alias = "WARN")]
    Warning,
    #[serde(alias = "error")]
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// One log event produced by a worker or the supervisor. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub logger: String,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            logger: logger.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Info, logger, message)
    }

    pub fn warning(logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, logger, message)
    }

    pub fn error(logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Error, logger, message)
    }
}
