//! Handlers for uploads and per-source endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/upload/:table` | Multipart, field `file` |
//! | `GET`    | `/tables/:table/sources` | Sorted source names |
//! | `GET`    | `/tables/:table/sources/:file` | `text/csv` attachment |
//! | `DELETE` | `/tables/:table/sources/:file` | Rows and stored file |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Multipart, Path, State},
  http::{HeaderValue, header},
  response::{IntoResponse, Response},
};
use serde::Serialize;
use strata_core::{DeleteReceipt, Error, TableService, TableStore, UploadReceipt};

use crate::error::ApiError;

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

/// Set on downloads rebuilt from stored rows rather than the original bytes.
const REGENERATED_HEADER: &str = "x-strata-regenerated";

// ─── Upload ───────────────────────────────────────────────────────────────────

/// `POST /upload/:table`
pub async fn upload<S: TableStore + 'static>(
  State(service): State<Arc<TableService<S>>>,
  Path(table): Path<String>,
  mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError> {
  // Reject unknown tables before reading the body.
  if !service.registry().validate(&table) {
    return Err(Error::InvalidTable(table).into());
  }

  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(FILE_FIELD) {
      continue;
    }
    let file_name = field.file_name().unwrap_or_default().to_owned();
    let bytes = field.bytes().await?;
    let receipt = service.upload(&table, &file_name, bytes).await?;
    return Ok(Json(receipt));
  }

  Err(Error::InvalidFile(format!("no `{FILE_FIELD}` part in request")).into())
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SourceList {
  pub sources: Vec<String>,
}

/// `GET /tables/:table/sources`
pub async fn list<S: TableStore>(
  State(service): State<Arc<TableService<S>>>,
  Path(table): Path<String>,
) -> Result<Json<SourceList>, ApiError> {
  let sources = service.list_sources(&table).await?;
  Ok(Json(SourceList { sources }))
}

// ─── Download ─────────────────────────────────────────────────────────────────

/// `GET /tables/:table/sources/:file`
pub async fn download<S: TableStore>(
  State(service): State<Arc<TableService<S>>>,
  Path((table, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
  let dl = service.download_source(&table, &file_name).await?;

  let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", dl.file_name))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

  let mut resp = (
    [
      (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    dl.bytes,
  )
    .into_response();
  if dl.regenerated {
    resp
      .headers_mut()
      .insert(REGENERATED_HEADER, HeaderValue::from_static("true"));
  }
  Ok(resp)
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /tables/:table/sources/:file`
pub async fn delete<S: TableStore>(
  State(service): State<Arc<TableService<S>>>,
  Path((table, file_name)): Path<(String, String)>,
) -> Result<Json<DeleteReceipt>, ApiError> {
  Ok(Json(service.delete_source(&table, &file_name).await?))
}
