//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::multipart::MultipartError,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use strata_core::ErrorKind;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] strata_core::Error),

  /// The multipart body could not be read (malformed, or over the size
  /// limit).
  #[error("bad upload body: {0}")]
  Multipart(#[from] MultipartError),
}

fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::InvalidTable | ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::InvalidFile | ErrorKind::InvalidColumn => StatusCode::BAD_REQUEST,
    ErrorKind::Conflict => StatusCode::CONFLICT,
    ErrorKind::IngestionFailure => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorKind::StorageError | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind, message) = match &self {
      ApiError::Core(e) => {
        let kind = e.kind();
        (status_for(kind), json!(kind), e.to_string())
      }
      ApiError::Multipart(e) => (e.status(), json!("invalid_file"), e.body_text()),
    };

    if status.is_server_error() {
      tracing::error!(error = %message, "request failed");
    }
    (status, Json(json!({ "kind": kind, "error": message }))).into_response()
  }
}
