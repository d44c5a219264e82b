//! Background upgrade of the downloader packages

use std::sync::Arc;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::logging::{LogRecord, RecordSink};

pub const UPDATE_LOGGER: &str = "update";

/// Runs each command in turn on a background task. Output goes to the sink
/// at INFO, or ERROR when the command fails or cannot start; one failing
/// command does not stop the rest.
pub fn spawn_update(commands: Vec<Vec<String>>, sink: Arc<dyn RecordSink>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for command in &commands {
            run_command(command, sink.as_ref()).await;
        }
    })
}

async fn run_command(command: &[String], sink: &dyn RecordSink) {
    let Some((program, args)) = command.split_first() else {
        return;
    };

    let output = match Command::new(program).args(args).output().await {
        Ok(output) => output,
        Err(e) => {
            sink.handle(LogRecord::error(
                UPDATE_LOGGER,
                format!("Failed to run {}: {e}", command.join(" ")),
            ));
            return;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if output.status.success() {
        sink.handle(LogRecord::info(UPDATE_LOGGER, stdout.trim_end()));
        return;
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = [stdout.trim(), stderr.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    tracing::debug!(command = %command.join(" "), status = %output.status, "Update command failed");
    sink.handle(LogRecord::error(UPDATE_LOGGER, detail));
}
