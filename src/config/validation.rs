use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("{field} must not be empty")]
    EmptyMarker { field: &'static str },

    #[error("downloader.program must not be empty")]
    EmptyProgram,

    #[error("downloader.update_commands entries must not be empty")]
    EmptyUpdateCommand,

    #[error("tail.stream_chunk must be greater than zero")]
    ZeroChunk,

    #[error("logging.file must name a file")]
    InvalidLogFile,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_intervals(config)?;
    validate_markers(config)?;
    validate_downloader(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_intervals(config: &Config) -> Result<(), ValidationError> {
    let intervals = [
        ("supervisor.poll_interval", config.supervisor.poll_interval),
        ("supervisor.join_timeout", config.supervisor.join_timeout),
        ("tail.poll_interval", config.tail.poll_interval),
    ];

    for (field, value) in intervals {
        if value.as_duration().is_zero() {
            return Err(ValidationError::ZeroInterval { field });
        }
    }

    if config.tail.stream_chunk.as_u64() == 0 {
        return Err(ValidationError::ZeroChunk);
    }

    Ok(())
}

/// An empty marker would match every line: every job killed, every line a progress line
fn validate_markers(config: &Config) -> Result<(), ValidationError> {
    if config.supervisor.kill_marker.is_empty() {
        return Err(ValidationError::EmptyMarker {
            field: "supervisor.kill_marker",
        });
    }

    if config.tail.progress_marker.is_empty() {
        return Err(ValidationError::EmptyMarker {
            field: "tail.progress_marker",
        });
    }

    Ok(())
}

fn validate_downloader(config: &Config) -> Result<(), ValidationError> {
    if config.downloader.program.trim().is_empty() {
        return Err(ValidationError::EmptyProgram);
    }
    if config.downloader.update_commands.iter().any(|c| c.is_empty()) {
        return Err(ValidationError::EmptyUpdateCommand);
    }
    Ok(())
}

fn validate_logging(config: &Config) -> Result<(), ValidationError> {
    if config.logging.file.file_name().is_none() {
        return Err(ValidationError::InvalidLogFile);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::{ByteSize, HumanDuration};
    use std::path::PathBuf;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = Config::default();
        config.tail.poll_interval = HumanDuration::from_millis(0);

        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ZeroInterval {
                field: "tail.poll_interval"
            }
        ));
    }

    #[test]
    fn test_empty_kill_marker_rejected() {
        let mut config = Config::default();
        config.supervisor.kill_marker = String::new();

        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyMarker { .. }));
    }

    #[test]
    fn test_blank_program_rejected() {
        let mut config = Config::default();
        config.downloader.program = "  ".to_string();
        assert!(matches!(
            validate(&config).unwrap_err(),
            ValidationError::EmptyProgram
        ));
    }

    #[test]
    fn test_empty_update_command_rejected() {
        let mut config = Config::default();
        config.downloader.update_commands.push(Vec::new());
        assert!(matches!(
            validate(&config).unwrap_err(),
            ValidationError::EmptyUpdateCommand
        ));
    }

    #[test]
    fn test_zero_chunk_and_bad_log_file_rejected() {
        let mut config = Config::default();
        config.tail.stream_chunk = ByteSize(0);
        assert!(matches!(validate(&config).unwrap_err(), ValidationError::ZeroChunk));

        let mut config = Config::default();
        config.logging.file = PathBuf::from("/");
        assert!(matches!(
            validate(&config).unwrap_err(),
            ValidationError::InvalidLogFile
        ));
    }
}
