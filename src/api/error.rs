use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::downloads::DownloadsError;
use crate::jobs::SubmitError;
use crate::logging::LogFileError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            code: self.code(),
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(value: SubmitError) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<LogFileError> for ApiError {
    fn from(value: LogFileError) -> Self {
        match value {
            LogFileError::NotFound(_) => ApiError::NotFound("Log file not found.".to_string()),
            LogFileError::Io(e) => ApiError::Internal(format!("An error occurred: {e}")),
        }
    }
}

impl From<DownloadsError> for ApiError {
    fn from(value: DownloadsError) -> Self {
        match value {
            DownloadsError::Scan(e) => {
                tracing::warn!(error = %e, "Download directory scan failed");
                ApiError::Internal("Unable to scan download directory.".to_string())
            }
            other => ApiError::NotFound(other.to_string()),
        }
    }
}
