//! Log Record Channel: newline-delimited JSON from a worker's stdout.
//!
//! A worker writes any number of `record` messages followed by one `exit`
//! message. The supervisor side splits the stream into an ordered record
//! queue and a single-slot status channel.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::logging::LogRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Record(LogRecord),
    Exit { code: i32 },
}

/// Writing half, owned by the worker process
pub struct ChannelWriter<W> {
    out: W,
}

impl<W: AsyncWrite + Unpin> ChannelWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub async fn send(&mut self, message: &WorkerMessage) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await
    }

    /// Forward records until every sender is dropped
    pub async fn drain(&mut self, mut records: mpsc::UnboundedReceiver<LogRecord>) -> std::io::Result<()> {
        while let Some(record) = records.recv().await {
            self.send(&WorkerMessage::Record(record)).await?;
        }
        Ok(())
    }
}

/// Reading half: split a worker's output into records and its final status.
/// The record sender is dropped when the stream ends, closing the queue.
pub fn demux<R>(
    reader: R,
) -> (
    mpsc::UnboundedReceiver<LogRecord>,
    oneshot::Receiver<i32>,
    JoinHandle<()>,
)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (record_tx, record_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut status_tx = Some(status_tx);
        let mut lines = reader.lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "Worker channel read failed");
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<WorkerMessage>(&line) {
                Ok(WorkerMessage::Record(record)) => {
                    if record_tx.send(record).is_err() {
                        break;
                    }
                }
                Ok(WorkerMessage::Exit { code }) => {
                    if let Some(tx) = status_tx.take() {
                        let _ = tx.send(code);
                    }
                }
                Err(e) => tracing::warn!(error = %e, line, "Discarding malformed worker message"),
            }
        }
    });

    (record_rx, status_rx, task)
}
