use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post, routing::put};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{
        clear_logs, get_download, get_logs, health, home, list_downloads, root, stream_logs,
        submit_job, update_packages, ws_logs,
    },
    state::AppState,
};
use crate::config::Config;
use crate::logging::LogSink;
use crate::worker::ProcessLauncher;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/gallery-dl", get(home))
        .route("/gallery-dl/q", post(submit_job))
        .route("/gallery-dl/logs", get(get_logs))
        .route("/gallery-dl/logs/clear", post(clear_logs))
        .route("/gallery-dl/update", put(update_packages))
        .route("/gallery-dl/downloads", get(list_downloads))
        .route("/gallery-dl/downloads/{*path}", get(get_download))
        .route("/stream/logs", get(stream_logs))
        .route("/ws/logs", get(ws_logs))
        .route("/health", get(health))
        .with_state(state)
        // gzip/deflate form bodies are decompressed before extraction
        .layer(RequestDecompressionLayer::new())
        .layer(CorsLayer::permissive())
}

pub async fn run(config: Config, sink: &'static LogSink) -> Result<(), AnyError> {
    let address: SocketAddr = config.server.bind_addr;

    let launcher = ProcessLauncher::current_exe(config.downloader.clone())
        .map_err(|e| format!("Failed to locate worker executable: {e}"))?;
    let state = AppState::new(config, Arc::new(launcher), Arc::new(sink));
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "gallery-dl-server listening");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sink.shutdown();
    served?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
