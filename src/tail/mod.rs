//! Live Tail: log delivery to connected viewers.
//!
//! Two read paths share the log file: [`stream_log`] sends the current
//! content once, and [`tail_log`] follows the file for as long as a viewer
//! stays connected. Tail sessions are fully independent of each other and of
//! the jobs writing the file.

mod registry;
mod session;
mod stream;
mod text;

pub use registry::{ViewerGuard, ViewerRegistry};
pub use session::{TailCursor, TailSession};
pub use stream::stream_log;
pub use text::{CrlfEncoder, take_utf8, to_crlf};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::config::TailConfig;
use crate::logging::LOG_NOT_FOUND;

#[derive(Debug, Error)]
#[error("viewer connection closed")]
pub struct ConnectionClosed;

/// A bidirectional connection to one viewer
#[async_trait]
pub trait ViewerConnection: Send {
    async fn send(&mut self, chunk: String) -> Result<(), ConnectionClosed>;

    /// Resolves once the viewer has gone away. Must be cancel-safe.
    async fn closed(&mut self);
}

/// Follow `path` for one viewer until it disconnects. If the file cannot be
/// opened the viewer gets a single "not found" message and the session ends.
pub async fn tail_log<C: ViewerConnection>(
    mut conn: C,
    path: &Path,
    settings: &TailConfig,
    viewers: &Arc<ViewerRegistry>,
) {
    let guard = viewers.register();

    let mut session = match TailSession::open(path, settings.progress_marker.clone()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!(viewer = %guard.id(), error = %e, "Cannot open log for tailing");
            let _ = conn.send(LOG_NOT_FOUND.to_string()).await;
            return;
        }
    };

    let mut ticker = tokio::time::interval(settings.poll_interval.as_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = conn.closed() => break,
            _ = ticker.tick() => {
                match session.poll().await {
                    Ok(Some(chunk)) => {
                        if conn.send(chunk).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    // unreadable for now; the next tick retries
                    Err(e) => tracing::debug!(viewer = %guard.id(), error = %e, "Tail poll failed"),
                }
            }
        }
    }
}
