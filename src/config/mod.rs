//! Configuration management for gallery-dl-server
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use gallery_dl_server::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `GDL_SERVER__<section>__<key>`:
//! - `GDL_SERVER__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `GDL_SERVER__TAIL__POLL_INTERVAL=250ms`
//! - `GDL_SERVER__SUPERVISOR__MIN_LEVEL=warning`
//!
//! `DOWNLOAD_DIR` and `DOWNLOAD_DEPTH` are also read for the downloads section.
//!
//! # Configuration File
//!
//! Loaded from `config/gallery-dl-server.toml` unless `GDL_SERVER_CONFIG`
//! points elsewhere. A missing file is not an error.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{
    Config, DownloaderConfig, DownloadsConfig, LoggingConfig, ServerConfig, SupervisorConfig,
    TailConfig,
};
pub use validation::ValidationError;

use thiserror::Error;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading the TOML file from `path` when given
    pub fn load_with(path: Option<std::path::PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Like [`Config::load_with`], for use before the Log Sink exists: load
    /// diagnostics (missing file, ignored variables) are printed to stderr.
    pub fn load_reported(path: Option<std::path::PathBuf>) -> Result<Self, ConfigError> {
        Self::load_reporting_to(path, std::io::stderr)
    }

    fn load_reporting_to<W>(path: Option<std::path::PathBuf>, writer: W) -> Result<Self, ConfigError>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let bootstrap = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_target(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(bootstrap, || Self::load_with(path))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
