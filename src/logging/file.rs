//! The shared, append-only log file

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOG_NOT_FOUND: &str = "Log file not found.";
pub const LOG_EMPTY: &str = "No logs to display.";

#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("log file not found: {0}")]
    NotFound(PathBuf),

    #[error("log file I/O error: {0}")]
    Io(#[source] io::Error),
}

impl LogFileError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            LogFileError::NotFound(path.to_path_buf())
        } else {
            LogFileError::Io(err)
        }
    }
}

/// Handle on the log file path. Writers go through the Log Sink; everything
/// here is either read-only or the administrative `clear`.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file for appending, creating it and its directory if needed.
    /// Append mode keeps writes landing at the end after a `clear`.
    pub fn open_append(&self) -> Result<File, LogFileError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(LogFileError::Io)?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LogFileError::from_io(&self.path, e))
    }

    /// Entire current content. Invalid UTF-8 is replaced rather than rejected.
    pub async fn read_all(&self) -> Result<String, LogFileError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| LogFileError::from_io(&self.path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Snapshot for display: the content, or a placeholder when there is none.
    pub async fn full_log(&self) -> String {
        match self.read_all().await {
            Ok(content) if content.is_empty() => LOG_EMPTY.to_string(),
            Ok(content) => content,
            Err(LogFileError::NotFound(_)) => LOG_NOT_FOUND.to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read log file");
                format!("An error occurred: {e}")
            }
        }
    }

    /// Truncates the file to empty. This is the only operation that shrinks it.
    pub async fn clear(&self) -> Result<(), LogFileError> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| LogFileError::from_io(&self.path, e))?;
        file.sync_all().await.map_err(LogFileError::Io)?;
        Ok(())
    }

    /// Copies a non-empty log file into `dir` under a timestamped name.
    /// Returns `None` when there was nothing to archive.
    pub fn archive_to(&self, dir: &Path) -> io::Result<Option<PathBuf>> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if size == 0 {
            return Ok(None);
        }

        fs::create_dir_all(dir)?;
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let target = dir.join(format!("app_{stamp}.log"));
        fs::copy(&self.path, &target)?;
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_full_log_placeholders() {
        let temp_dir = TempDir::new().unwrap();
        let log = LogFile::new(temp_dir.path().join("logs/app.log"));

        assert_eq!(log.full_log().await, LOG_NOT_FOUND);

        log.open_append().unwrap();
        assert_eq!(log.full_log().await, LOG_EMPTY);
    }

    #[tokio::test]
    async fn test_clear_then_read_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let log = LogFile::new(temp_dir.path().join("app.log"));

        let mut file = log.open_append().unwrap();
        writeln!(file, "01/01/2026 10:00 [INFO] hello").unwrap();
        assert!(log.read_all().await.unwrap().contains("hello"));

        log.clear().await.unwrap();
        assert_eq!(log.full_log().await, LOG_EMPTY);
        log.clear().await.unwrap();
        assert_eq!(log.full_log().await, LOG_EMPTY);

        // the append handle keeps working from the new end
        writeln!(file, "after").unwrap();
        assert_eq!(log.read_all().await.unwrap(), "after\n");
    }

    #[tokio::test]
    async fn test_clear_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let log = LogFile::new(temp_dir.path().join("missing.log"));

        assert!(matches!(
            log.clear().await.unwrap_err(),
            LogFileError::NotFound(_)
        ));
    }

    #[test]
    fn test_archive_skips_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let log = LogFile::new(temp_dir.path().join("app.log"));
        let archive = temp_dir.path().join("archive");

        assert!(log.archive_to(&archive).unwrap().is_none());

        let mut file = log.open_append().unwrap();
        assert!(log.archive_to(&archive).unwrap().is_none());

        writeln!(file, "line").unwrap();
        let copied = log.archive_to(&archive).unwrap().unwrap();
        assert_eq!(fs::read_to_string(copied).unwrap(), "line\n");
    }
}
