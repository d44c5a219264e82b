use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "GDL_SERVER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/gallery-dl-server.toml";
const ENV_PREFIX: &str = "GDL_SERVER";
const ENV_SEPARATOR: &str = "__";

const DOWNLOAD_DIR_VAR: &str = "DOWNLOAD_DIR";
const DOWNLOAD_DEPTH_VAR: &str = "DOWNLOAD_DEPTH";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
///
/// An explicit `path` takes precedence over `GDL_SERVER_CONFIG`.
pub fn load(path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    apply_legacy_env(
        &mut config,
        env::var(DOWNLOAD_DIR_VAR).ok(),
        env::var(DOWNLOAD_DEPTH_VAR).ok(),
    );

    Ok(config)
}

/// Honour the plain `DOWNLOAD_DIR` / `DOWNLOAD_DEPTH` variables container
/// deployments already set. A depth that is negative or not a number is ignored.
fn apply_legacy_env(config: &mut Config, dir: Option<String>, depth: Option<String>) {
    if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
        config.downloads.dir = PathBuf::from(dir);
    }

    if let Some(depth) = depth {
        match depth.trim().parse::<usize>() {
            Ok(value) => config.downloads.max_depth = Some(value),
            Err(_) => tracing::warn!(%depth, "Ignoring invalid DOWNLOAD_DEPTH"),
        }
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // GDL_SERVER__TAIL__POLL_INTERVAL -> tail.poll_interval
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:9080");
        assert_eq!(config.tail.progress_marker, "B/s");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[logging]
file = "/var/log/gdl/app.log"
archive_dir = "/config/logs"
crlf_stream = true

[supervisor]
poll_interval = "500ms"
kill_marker = "stuck"

[tail]
stream_chunk = "16KB"

[downloader]
program = "/usr/local/bin/gallery-dl"
extra_args = ["--verbose"]

[downloads]
dir = "/gallery-dl"
max_depth = 2
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.logging.file, PathBuf::from("/var/log/gdl/app.log"));
        assert_eq!(config.logging.archive_dir, Some(PathBuf::from("/config/logs")));
        assert!(config.logging.crlf_stream);
        assert_eq!(config.supervisor.poll_interval.as_duration(), Duration::from_millis(500));
        assert_eq!(config.supervisor.kill_marker, "stuck");
        assert_eq!(config.tail.stream_chunk.as_u64(), 16 * 1024);
        assert_eq!(config.downloader.extra_args, vec!["--verbose".to_string()]);
        assert_eq!(config.downloads.max_depth, Some(2));
    }

    #[test]
    fn test_legacy_env_overrides() {
        let mut config = Config::default();
        apply_legacy_env(&mut config, Some("/data/downloads".into()), Some("3".into()));

        assert_eq!(config.downloads.dir, PathBuf::from("/data/downloads"));
        assert_eq!(config.downloads.max_depth, Some(3));
    }

    #[test]
    fn test_legacy_env_ignores_bad_depth() {
        let mut config = Config::default();
        apply_legacy_env(&mut config, None, Some("-1".into()));
        assert_eq!(config.downloads.max_depth, None);

        apply_legacy_env(&mut config, Some("   ".into()), Some("deep".into()));
        assert_eq!(config.downloads.max_depth, None);
        assert_eq!(config.downloads.dir, PathBuf::from("gallery-dl"));
    }
}
