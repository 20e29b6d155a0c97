//! The `TableStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `strata-store-sqlite`).
//! [`TableService`](crate::service::TableService) depends on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  filter::Filter,
  row::{Row, RowBatch},
  schema::Schema,
};

/// Abstraction over the tabular storage engine.
///
/// Every table has an integer `id` primary key and a non-null `origin_file`
/// column from creation; all other columns are nullable text added through
/// [`add_column`](TableStore::add_column). Table and column names passed in
/// are sanitized identifiers that the caller has already validated.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TableStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Schema ────────────────────────────────────────────────────────────

  /// Create `table` with its system columns if it does not exist.
  fn create_table<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The live, ordered column list of `table`.
  fn schema<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<Schema, Self::Error>> + Send + 'a;

  /// Add a nullable text column. Returns `false` without error if the
  /// column already exists.
  fn add_column<'a>(
    &'a self,
    table: &'a str,
    column: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Append every row of `batch` atomically: either all rows are stored or
  /// none are. Returns the number of rows written.
  fn append_rows<'a>(
    &'a self,
    table: &'a str,
    batch: RowBatch,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Delete every row whose `origin_file` equals `origin`. Returns the
  /// number of rows removed.
  fn delete_origin<'a>(
    &'a self,
    table: &'a str,
    origin: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Rows matching `filter`, ordered by `id`.
  fn select<'a>(
    &'a self,
    table: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + 'a;

  /// A single row by identity.
  fn get_row<'a>(
    &'a self,
    table: &'a str,
    id: i64,
  ) -> impl Future<Output = Result<Option<Row>, Self::Error>> + Send + 'a;

  /// Distinct `origin_file` values present in `table`, sorted.
  fn origins<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  /// Whether any row carries `origin` as its `origin_file`.
  fn has_origin<'a>(
    &'a self,
    table: &'a str,
    origin: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
