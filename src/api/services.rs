use async_trait::async_trait;
use axum::{
    Json,
    body::Body,
    extract::{
        Form, Path, Request, State,
        rejection::FormRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::convert::Infallible;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::{
    error::ApiError,
    models::{
        DownloadsResponse, HealthResponse, JobAcceptedResponse, MessageResponse, SubmitForm,
        UpdateResponse,
    },
    state::AppState,
};
use crate::downloads::{self, encode_path};
use crate::jobs::{JobOptions, VideoOptions};
use crate::tail::{ConnectionClosed, ViewerConnection};

pub const HOME_ROUTE: &str = "/gallery-dl";

fn plain_text(body: impl Into<Body>) -> Response {
    (
        [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())],
        body.into(),
    )
        .into_response()
}

/// Redirect browsers to the status page (GET /)
pub async fn root() -> Redirect {
    Redirect::to(HOME_ROUTE)
}

/// Status page (GET /gallery-dl)
pub async fn home(State(state): State<AppState>) -> Response {
    plain_text(format!(
        "gallery-dl-server {}\ndownloader: {}\n",
        env!("CARGO_PKG_VERSION"),
        state.config.downloader.program,
    ))
}

/// Job submission (POST /gallery-dl/q)
///
/// Accepts a form with `url` and optional `video-opts`. The job is started
/// in the background; the response never waits for the download. Requests
/// carrying `ui` are answered with a redirect back to the status page.
pub async fn submit_job(
    State(state): State<AppState>,
    form: Result<Form<SubmitForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    let options = JobOptions::with_video(VideoOptions::from_form(form.video_opts.as_deref()));
    let from_ui = form.ui.is_some();

    let job = match state.submit_job(form.url.as_deref(), options) {
        Ok(job) => job,
        Err(_) if from_ui => return Ok(Redirect::to(HOME_ROUTE).into_response()),
        Err(e) => return Err(e.into()),
    };

    if from_ui {
        let target = format!("{HOME_ROUTE}?added={}", encode_path(&job.url));
        return Ok(Redirect::to(&target).into_response());
    }

    let response = JobAcceptedResponse {
        success: true,
        url: job.url,
        options: job.options,
    };
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

/// Whole log as text (GET /gallery-dl/logs)
pub async fn get_logs(State(state): State<AppState>) -> Response {
    plain_text(state.get_full_log().await)
}

/// Truncate the log (POST /gallery-dl/logs/clear)
pub async fn clear_logs(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    state.clear_log().await?;
    tracing::debug!("Log file cleared");
    Ok(Json(MessageResponse {
        success: true,
        message: "Logs successfully cleared.".to_string(),
    }))
}

/// Upgrade the downloader packages in the background (PUT /gallery-dl/update)
pub async fn update_packages(State(state): State<AppState>) -> Json<UpdateResponse> {
    state.update_packages();
    Json(UpdateResponse {
        output: "Initiated package update.".to_string(),
    })
}

/// Current log content as a chunked body (GET /stream/logs)
pub async fn stream_logs(State(state): State<AppState>) -> Response {
    let body = Body::from_stream(state.stream_log().map(Ok::<_, Infallible>));
    plain_text(body)
}

/// Live Tail over a WebSocket (GET /ws/logs)
pub async fn ws_logs(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        state.tail_log_socket(SocketViewer(socket)).await;
    })
}

struct SocketViewer(WebSocket);

#[async_trait]
impl ViewerConnection for SocketViewer {
    async fn send(&mut self, chunk: String) -> Result<(), ConnectionClosed> {
        self.0
            .send(Message::Text(chunk.into()))
            .await
            .map_err(|_| ConnectionClosed)
    }

    async fn closed(&mut self) {
        loop {
            match self.0.recv().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    }
}

/// Files under the download directory (GET /gallery-dl/downloads)
pub async fn list_downloads(State(state): State<AppState>) -> Result<Json<DownloadsResponse>, ApiError> {
    let settings = state.config.downloads.clone();
    let root = settings.dir.clone();

    let files = tokio::task::spawn_blocking(move || downloads::list_downloads(&settings.dir, settings.max_depth))
        .await
        .map_err(|e| ApiError::Internal(format!("Download listing task failed: {e}")))??;

    let directory = root
        .canonicalize()
        .unwrap_or(root)
        .display()
        .to_string();

    Ok(Json(DownloadsResponse {
        success: true,
        directory,
        files,
    }))
}

/// One downloaded file (GET /gallery-dl/downloads/{*path})
pub async fn get_download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let target = downloads::resolve_download(&state.config.downloads.dir, &path)?;

    match ServeFile::new(target).oneshot(request).await {
        Ok(response) => Ok(response.into_response()),
        Err(never) => match never {},
    }
}

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = BTreeMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let log_status = match tokio::fs::metadata(state.log_file.path()).await {
        Ok(_) => "healthy",
        Err(_) => "missing",
    };
    components.insert("log_file".to_string(), log_status.to_string());
    components.insert(
        "downloader".to_string(),
        state.config.downloader.program.clone(),
    );

    let response = HealthResponse {
        status: "healthy".to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_viewers: state.viewers.count(),
        metrics: state.metrics.snapshot(),
    };

    (StatusCode::OK, Json(response))
}
