//! One download, from configuration load to exit code

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

use crate::logging::LogRecord;

use super::WorkerRequest;
use super::overrides::apply_overrides;
use super::tool::{DownloadTool, WORKER_LOGGER};

/// Exit code reported when the tool could not be run at all
pub const FAILED_TO_RUN: i32 = 1;

/// Loads the downloader configuration afresh, applies the job's overrides and
/// runs `tool`. Every step is reported on `records`; the return value is the
/// job's exit code.
pub async fn run_worker(
    request: &WorkerRequest,
    tool: &dyn DownloadTool,
    records: &UnboundedSender<LogRecord>,
) -> i32 {
    let send = |record: LogRecord| {
        let _ = records.send(record);
    };

    let mut config = load_downloader_config(&request.downloader.config_paths, &send).await;
    send(LogRecord::info(WORKER_LOGGER, "Reloaded gallery-dl configuration."));

    apply_overrides(&mut config, &request.job.options);
    let options = serde_json::to_string(&request.job.options).unwrap_or_default();
    send(LogRecord::info(
        WORKER_LOGGER,
        format!("Requested download with the following overriding options: {options}"),
    ));

    match tool.run(&request.job.url, &config, records).await {
        Ok(code) => code,
        Err(e) => {
            send(LogRecord::error(WORKER_LOGGER, e.to_string()));
            FAILED_TO_RUN
        }
    }
}

/// First existing candidate wins. No file at all means an empty configuration.
pub fn find_config(paths: &[PathBuf]) -> Option<&Path> {
    paths.iter().map(PathBuf::as_path).find(|p| p.is_file())
}

async fn load_downloader_config(paths: &[PathBuf], send: &impl Fn(LogRecord)) -> Value {
    let empty = Value::Object(Map::new());
    let Some(path) = find_config(paths) else {
        return empty;
    };

    let parsed = match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match parsed {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            send(LogRecord::warning(
                WORKER_LOGGER,
                format!("Ignoring {}: top level is not an object", path.display()),
            ));
            empty
        }
        Err(e) => {
            send(LogRecord::warning(
                WORKER_LOGGER,
                format!("Failed to load {}: {e}", path.display()),
            ));
            empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloaderConfig;
    use crate::jobs::{Job, JobOptions, VideoOptions};
    use crate::logging::Level;
    use crate::worker::WorkerError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Remembers the configuration it was handed
    #[derive(Default)]
    struct RecordingTool {
        seen: Mutex<Option<(String, Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl DownloadTool for RecordingTool {
        async fn run(
            &self,
            url: &str,
            config: &Value,
            records: &UnboundedSender<LogRecord>,
        ) -> Result<i32, WorkerError> {
            *self.seen.lock().unwrap() = Some((url.to_string(), config.clone()));
            if self.fail {
                return Err(WorkerError::Spawn {
                    program: "gallery-dl".into(),
                    source: std::io::ErrorKind::NotFound.into(),
                });
            }
            let _ = records.send(LogRecord::info(WORKER_LOGGER, "/out/a.jpg"));
            Ok(0)
        }
    }

    fn request(paths: Vec<PathBuf>, video: VideoOptions) -> WorkerRequest {
        WorkerRequest {
            job: Job::new("https://example.com/gallery", JobOptions::with_video(video)),
            downloader: DownloaderConfig {
                config_paths: paths,
                ..DownloaderConfig::default()
            },
        }
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<LogRecord>) -> Vec<LogRecord> {
        let mut out = Vec::new();
        while let Some(r) = rx.recv().await {
            out.push(r);
        }
        out
    }

    #[tokio::test]
    async fn test_extract_audio_reaches_tool() {
        let temp_dir = TempDir::new().unwrap();
        let conf = temp_dir.path().join("gallery-dl.conf");
        std::fs::write(&conf, r#"{"base-directory": "/downloads"}"#).unwrap();

        let tool = RecordingTool::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let code = run_worker(
            &request(vec![temp_dir.path().join("missing.conf"), conf], VideoOptions::ExtractAudio),
            &tool,
            &tx,
        )
        .await;
        drop(tx);
        assert_eq!(code, 0);

        let (url, config) = tool.seen.lock().unwrap().clone().unwrap();
        assert_eq!(url, "https://example.com/gallery");
        assert_eq!(config["base-directory"], "/downloads");
        assert_eq!(
            config.pointer("/extractor/ytdl/raw-options/postprocessors/0/key"),
            Some(&Value::from("FFmpegExtractAudio"))
        );

        let messages: Vec<_> = collect(rx).await.into_iter().map(|r| r.message).collect();
        assert_eq!(
            messages,
            vec![
                "Reloaded gallery-dl configuration.".to_string(),
                r#"Requested download with the following overriding options: {"video-options":"extract-audio"}"#.to_string(),
                "/out/a.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_config_warns_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let conf = temp_dir.path().join("gallery-dl.conf");
        std::fs::write(&conf, "{ not json").unwrap();

        let tool = RecordingTool::default();
        let (tx, rx) = mpsc::unbounded_channel();
        assert_eq!(run_worker(&request(vec![conf], VideoOptions::NoneSelected), &tool, &tx).await, 0);
        drop(tx);

        let (_, config) = tool.seen.lock().unwrap().clone().unwrap();
        assert_eq!(config, Value::Object(Map::new()));
        let records = collect(rx).await;
        assert_eq!(records[0].level, Level::Warning);
    }

    #[tokio::test]
    async fn test_tool_error_is_reported_and_fails() {
        let tool = RecordingTool {
            fail: true,
            ..RecordingTool::default()
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let code = run_worker(&request(vec![], VideoOptions::NoneSelected), &tool, &tx).await;
        drop(tx);

        assert_eq!(code, FAILED_TO_RUN);
        let last = collect(rx).await.pop().unwrap();
        assert_eq!(last.level, Level::Error);
        assert!(last.message.contains("gallery-dl"));
    }
}
