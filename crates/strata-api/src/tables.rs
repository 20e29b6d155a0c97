//! Handlers for `/tables` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tables` | Registered names, sorted |
//! | `GET`  | `/tables/:table/schema` | Live column list |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Serialize;
use strata_core::{TableService, TableStore, schema::Schema};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct TableList {
  pub tables: Vec<String>,
}

/// `GET /tables`
pub async fn list<S: TableStore>(State(service): State<Arc<TableService<S>>>) -> Json<TableList> {
  Json(TableList { tables: service.list_tables() })
}

/// `GET /tables/:table/schema`
pub async fn schema<S: TableStore>(
  State(service): State<Arc<TableService<S>>>,
  Path(table): Path<String>,
) -> Result<Json<Schema>, ApiError> {
  Ok(Json(service.schema(&table).await?))
}
