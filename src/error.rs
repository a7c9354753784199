//! Error taxonomy for the API surface.
//!
//! Analyzer failures inside background jobs are NOT surfaced through this
//! type; they are absorbed into the recording's `failed` status and observed
//! by polling. `ApiError` covers the synchronous request path only.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  /// Session/recording/assessment type absent, or not owned by the caller.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("validation error: {0}")]
  Validation(String),

  /// Duplicate dispatch guard: the recording is already processing or done.
  #[error("conflict: {0}")]
  Conflict(String),

  /// File write/copy/delete failure.
  #[error("storage error: {0}")]
  Storage(String),

  /// Synchronous analyzer call failed (text analysis path only).
  #[error("analyzer error: {0}")]
  Analyzer(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::Analyzer(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let body = Json(json!({ "success": false, "error": self.to_string() }));
    (status, body).into_response()
  }
}

impl From<std::io::Error> for ApiError {
  fn from(e: std::io::Error) -> Self {
    ApiError::Storage(e.to_string())
  }
}
