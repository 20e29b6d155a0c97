//! Handlers for `/tables/:table/rows` endpoints.
//!
//! Every query-string pair is an equality filter; pairs are ANDed. Naming a
//! column twice is rejected.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use strata_core::{TableService, TableStore, filter::Filter, row::Row};

use crate::error::ApiError;

/// `GET /tables/:table/rows[?col=value&...]`
pub async fn query<S: TableStore>(
  State(service): State<Arc<TableService<S>>>,
  Path(table): Path<String>,
  Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Row>>, ApiError> {
  let filters = Filter::collect_pairs(pairs)?;
  Ok(Json(service.query(&table, filters).await?))
}

/// `GET /tables/:table/rows/:id`
pub async fn get_one<S: TableStore>(
  State(service): State<Arc<TableService<S>>>,
  Path((table, id)): Path<(String, i64)>,
) -> Result<Json<Row>, ApiError> {
  Ok(Json(service.get_row(&table, id).await?))
}
