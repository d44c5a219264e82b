//! The external downloader and how its output becomes log records

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::io::Write as _;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::DownloaderConfig;
use crate::logging::LogRecord;

use super::WorkerError;

pub const WORKER_LOGGER: &str = "worker";
pub const ARCHIVED_MESSAGE: &str = "File already exists and/or its ID is in a download archive";

static ANSI_ESCAPE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    match Regex::new(r"\x1B\[[0-?9;]*[mGKH]") {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to compile ANSI escape pattern");
            None
        }
    }
});

pub fn strip_ansi(text: &str) -> String {
    match ANSI_ESCAPE.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Turn one line of downloader stdout into a record. Blank lines yield nothing;
/// lines starting with `#` mean the file was skipped as already downloaded.
pub fn classify_line(raw: &str) -> Option<LogRecord> {
    let line = strip_ansi(raw);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.strip_prefix('#') {
        Some(path) => Some(LogRecord::warning(
            WORKER_LOGGER,
            format!("{ARCHIVED_MESSAGE}: {}", path.trim()),
        )),
        None => Some(LogRecord::info(WORKER_LOGGER, line)),
    }
}

pub fn exit_code(status: ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|s| -s))
    }
    #[cfg(not(unix))]
    {
        status.code()
    }
}

/// Runs one download with an already-effective configuration
#[async_trait]
pub trait DownloadTool: Send + Sync {
    /// Returns the tool's exit code. Output lines are sent to `records` as
    /// they are produced.
    async fn run(
        &self,
        url: &str,
        config: &Value,
        records: &UnboundedSender<LogRecord>,
    ) -> Result<i32, WorkerError>;
}

/// The real `gallery-dl` executable
#[derive(Debug, Clone)]
pub struct GalleryDl {
    program: String,
    extra_args: Vec<String>,
}

impl GalleryDl {
    pub fn new(settings: &DownloaderConfig) -> Self {
        Self {
            program: settings.program.clone(),
            extra_args: settings.extra_args.clone(),
        }
    }
}

#[async_trait]
impl DownloadTool for GalleryDl {
    async fn run(
        &self,
        url: &str,
        config: &Value,
        records: &UnboundedSender<LogRecord>,
    ) -> Result<i32, WorkerError> {
        // Kept alive until the child exits
        let mut config_file = tempfile::Builder::new()
            .prefix("gallery-dl-")
            .suffix(".json")
            .tempfile()
            .map_err(WorkerError::ConfigWrite)?;
        serde_json::to_writer_pretty(config_file.as_file_mut(), config)
            .map_err(|e| WorkerError::ConfigWrite(e.into()))?;
        config_file.flush().map_err(WorkerError::ConfigWrite)?;

        let mut child = Command::new(&self.program)
            .args(&self.extra_args)
            .arg("--config-ignore")
            .arg("--config")
            .arg(config_file.path())
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).split(b'\n');
            while let Some(bytes) = lines.next_segment().await.map_err(WorkerError::Output)? {
                if let Some(record) = classify_line(&String::from_utf8_lossy(&bytes)) {
                    let _ = records.send(record);
                }
            }
        }

        let stderr = stderr_task.await.unwrap_or_default();
        let stderr = strip_ansi(&stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            let _ = records.send(LogRecord::error(WORKER_LOGGER, stderr));
        }

        let status = child.wait().await.map_err(WorkerError::Output)?;
        // a signal with no number still counts as failure
        Ok(exit_code(status).unwrap_or(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Level;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;32m./a.jpg\x1b[0m"), "./a.jpg");
        assert_eq!(strip_ansi("\x1b[2Kplain"), "plain");
        assert_eq!(strip_ansi("no escapes"), "no escapes");
    }

    #[test]
    fn test_classify_line() {
        let warn = classify_line("# ./gallery-dl/site/a.jpg\r").unwrap();
        assert_eq!(warn.level, Level::Warning);
        assert_eq!(warn.message, format!("{ARCHIVED_MESSAGE}: ./gallery-dl/site/a.jpg"));

        let info = classify_line("\x1b[1m./gallery-dl/site/b.jpg\x1b[0m\n").unwrap();
        assert_eq!(info.level, Level::Info);
        assert_eq!(info.message, "./gallery-dl/site/b.jpg");

        assert!(classify_line("   \n").is_none());
        assert!(classify_line("\x1b[0m").is_none());
    }

    #[test]
    fn test_hash_only_prefix_is_warning() {
        // a `#` anywhere else is ordinary output
        let info = classify_line("./tag/#art.jpg").unwrap();
        assert_eq!(info.level, Level::Info);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_gallery_dl_runs_program_and_classifies_output() {
        use std::os::unix::fs::PermissionsExt;
        use tokio::sync::mpsc;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("fake-gallery-dl");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             for last; do :; done\n\
             echo \"/out/$last.jpg\"\n\
             echo '# /out/old.jpg'\n\
             echo 'boom' >&2\n\
             exit 4\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tool = GalleryDl::new(&DownloaderConfig {
            program: script.to_string_lossy().into_owned(),
            ..DownloaderConfig::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let code = tool.run("item", &serde_json::json!({}), &tx).await.unwrap();
        drop(tx);

        assert_eq!(code, 4);
        let mut got = Vec::new();
        while let Some(record) = rx.recv().await {
            got.push((record.level, record.message));
        }
        assert_eq!(
            got,
            vec![
                (Level::Info, "/out/item.jpg".to_string()),
                (Level::Warning, format!("{ARCHIVED_MESSAGE}: /out/old.jpg")),
                (Level::Error, "boom".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let tool = GalleryDl::new(&DownloaderConfig {
            program: "/nonexistent/gallery-dl".to_string(),
            ..DownloaderConfig::default()
        });
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = tool.run("u", &serde_json::json!({}), &tx).await.unwrap_err();
        assert!(matches!(err, WorkerError::Spawn { .. }));
    }
}
