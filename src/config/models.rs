use crate::humanize::{ByteSize, HumanDuration};
use crate::logging::Level;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub tail: TailConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9080))
}

/// Log Sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// The single shared log file every job writes through
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    /// Directive for the process-wide filter; `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Where the log file is copied on shutdown (best-effort)
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    /// Translate `\n` to `\r\n` in `/stream/logs`
    #[serde(default = "default_crlf_stream")]
    pub crlf_stream: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
            archive_dir: None,
            crlf_stream: default_crlf_stream(),
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/app.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_crlf_stream() -> bool {
    cfg!(windows)
}

/// Job Supervisor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupervisorConfig {
    /// Bounded wait on the record channel before re-checking worker liveness
    #[serde(default = "default_supervisor_poll")]
    pub poll_interval: HumanDuration,
    /// Bounded wait for OS-level cleanup once the worker has exited
    #[serde(default = "default_join_timeout")]
    pub join_timeout: HumanDuration,
    /// Worker records below this level are not relayed
    #[serde(default = "default_min_level")]
    pub min_level: Level,
    /// Substring that marks a job as stuck; its worker is killed
    #[serde(default = "default_kill_marker")]
    pub kill_marker: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_supervisor_poll(),
            join_timeout: default_join_timeout(),
            min_level: default_min_level(),
            kill_marker: default_kill_marker(),
        }
    }
}

fn default_supervisor_poll() -> HumanDuration {
    HumanDuration::from_millis(1000)
}

fn default_join_timeout() -> HumanDuration {
    HumanDuration::from_millis(5000)
}

fn default_min_level() -> Level {
    Level::Info
}

fn default_kill_marker() -> String {
    "Video should already be available".to_string()
}

/// Live Tail configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TailConfig {
    #[serde(default = "default_tail_poll")]
    pub poll_interval: HumanDuration,
    /// Substring identifying lines the downloader overwrites in place
    #[serde(default = "default_progress_marker")]
    pub progress_marker: String,
    /// Read size used by `/stream/logs`
    #[serde(default = "default_stream_chunk")]
    pub stream_chunk: ByteSize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_tail_poll(),
            progress_marker: default_progress_marker(),
            stream_chunk: default_stream_chunk(),
        }
    }
}

fn default_tail_poll() -> HumanDuration {
    HumanDuration::from_millis(100)
}

fn default_progress_marker() -> String {
    "B/s".to_string()
}

fn default_stream_chunk() -> ByteSize {
    ByteSize(64 * 1024)
}

/// External downloader invocation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Candidate downloader configuration files; the first existing one is loaded
    #[serde(default = "default_config_paths")]
    pub config_paths: Vec<PathBuf>,
    /// Arguments placed before the generated `--config` flags
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Commands run in order by the package update endpoint
    #[serde(default = "default_update_commands")]
    pub update_commands: Vec<Vec<String>>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            config_paths: default_config_paths(),
            extra_args: Vec::new(),
            update_commands: default_update_commands(),
        }
    }
}

fn default_update_commands() -> Vec<Vec<String>> {
    ["gallery_dl", "yt-dlp"]
        .into_iter()
        .map(|package| {
            ["python3", "-m", "pip", "install", "--upgrade", package]
                .map(String::from)
                .to_vec()
        })
        .collect()
}

fn default_program() -> String {
    "gallery-dl".to_string()
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/config/gallery-dl.conf")];
    if let Ok(home) = std::env::var("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".config/gallery-dl/config.json"));
        paths.push(home.join(".gallery-dl.conf"));
    }
    paths.push(PathBuf::from("/etc/gallery-dl.conf"));
    paths
}

/// Download directory exposed by the listing endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_downloads_dir")]
    pub dir: PathBuf,
    /// Deepest directory level listed; `None` lists everything
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            dir: default_downloads_dir(),
            max_depth: None,
        }
    }
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("gallery-dl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:9080");
        assert_eq!(config.logging.file, PathBuf::from("logs/app.log"));
        assert_eq!(config.supervisor.poll_interval.as_duration(), Duration::from_secs(1));
        assert_eq!(config.supervisor.min_level, Level::Info);
        assert_eq!(config.supervisor.kill_marker, "Video should already be available");
        assert_eq!(config.tail.poll_interval.as_duration(), Duration::from_millis(100));
        assert_eq!(config.tail.progress_marker, "B/s");
        assert_eq!(config.tail.stream_chunk.as_u64(), 64 * 1024);
        assert_eq!(config.downloader.program, "gallery-dl");
        assert_eq!(config.downloader.update_commands.len(), 2);
        assert_eq!(config.downloader.update_commands[1].last().unwrap(), "yt-dlp");
        assert!(config.downloads.max_depth.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[supervisor]
min_level = "warning"

[tail]
poll_interval = "250ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.supervisor.min_level, Level::Warning);
        assert_eq!(config.supervisor.join_timeout.as_duration(), Duration::from_secs(5));
        assert_eq!(config.tail.poll_interval.as_duration(), Duration::from_millis(250));
        assert_eq!(config.tail.progress_marker, "B/s");
    }
}
