//! Request and response bodies for the HTTP surface

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::downloads::DownloadEntry;
use crate::jobs::JobOptions;
use crate::observability::MetricsSnapshot;

/// Form posted to `/gallery-dl/q`
#[derive(Debug, Default, Deserialize)]
pub struct SubmitForm {
    pub url: Option<String>,
    #[serde(rename = "video-opts")]
    pub video_opts: Option<String>,
    /// Present when the request comes from the browser page
    pub ui: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobAcceptedResponse {
    pub success: bool,
    pub url: String,
    pub options: JobOptions,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub output: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadsResponse {
    pub success: bool,
    pub directory: String,
    pub files: Vec<DownloadEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: &'static str,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub version: String,
    pub active_viewers: usize,
    pub metrics: MetricsSnapshot,
}
