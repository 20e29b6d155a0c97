//! The ingestion pipeline: one uploaded CSV file into one table.
//!
//! Validation (table, file name, duplicate source, parse, headers) happens
//! in the caller's task before anything is written. The mutating part runs
//! on a spawned task under the table's write lock: schema evolution, the row
//! append, and the provenance write. Dropping the `upload` future (a client
//! disconnect, a timeout) does not stop that task, so it always reaches
//! either a stored file or its compensation. If the provenance write fails,
//! the appended rows are deleted again so the rows and the stored file
//! either both exist or neither does. Columns added by evolution are left in
//! place; an empty nullable column is harmless.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
  Error, Result,
  provenance::{has_accepted_extension, normalize_file_name},
  row::RowBatch,
  sanitize::sanitize_headers,
  schema::{ORIGIN_COLUMN, evolve},
  service::{TableHandle, TableService, UploadReceipt},
  store::TableStore,
  tabular,
};

impl<S: TableStore + 'static> TableService<S> {
  /// Ingest `bytes` as a new source named `file_name` in `table`.
  pub async fn upload(
    &self,
    table: &str,
    file_name: &str,
    bytes: Bytes,
  ) -> Result<UploadReceipt> {
    let handle = self.handle(table)?;
    let name = self.checked_file_name(file_name)?;

    if source_exists(&*self.store, table, handle, &name).await? {
      tracing::warn!(table, source = %name, "duplicate upload rejected");
      return Err(conflict(table, &name));
    }

    let parsed = tabular::parse(&bytes)?;
    let mut columns = sanitize_headers(&parsed.headers)?;
    tracing::debug!(
      table,
      source = %name,
      columns = columns.len(),
      rows = parsed.records.len(),
      "parsed upload"
    );

    columns.push(ORIGIN_COLUMN.to_string());
    let rows = parsed
      .records
      .into_iter()
      .map(|mut cells| {
        cells.push(Some(name.clone()));
        cells
      })
      .collect();
    let batch = RowBatch { columns, rows };

    let task = tokio::spawn(commit(
      Arc::clone(&self.store),
      Arc::clone(handle),
      table.to_owned(),
      name.clone(),
      batch,
      bytes,
    ));
    let row_count = task.await.map_err(Error::ingestion)??;

    tracing::info!(table, source = %name, row_count, "upload ingested");
    Ok(UploadReceipt {
      table: table.to_owned(),
      file_name: name,
      row_count,
    })
  }

  /// Normalise `file_name` and check its extension.
  fn checked_file_name(&self, file_name: &str) -> Result<String> {
    if file_name.trim().is_empty() {
      return Err(Error::InvalidFile("no file name given".to_string()));
    }

    let name = normalize_file_name(file_name);
    if name.is_empty() {
      return Err(Error::InvalidFile(format!("{file_name:?} is not a usable file name")));
    }
    if !has_accepted_extension(&name, &self.options.accepted_extensions) {
      return Err(Error::InvalidFile(format!(
        "{file_name:?} must have one of the extensions {:?}",
        self.options.accepted_extensions
      )));
    }
    Ok(name)
  }
}

/// The locked half of an upload. Owns everything it touches so it can run
/// to completion on its own task.
async fn commit<S: TableStore>(
  store: Arc<S>,
  handle: Arc<TableHandle>,
  table: String,
  name: String,
  batch: RowBatch,
  bytes: Bytes,
) -> Result<u64> {
  let _guard = handle.lock.lock().await;

  // Another upload of the same name may have finished while we parsed.
  if source_exists(&*store, &table, &handle, &name).await? {
    tracing::warn!(table, source = %name, "duplicate upload rejected");
    return Err(conflict(&table, &name));
  }

  evolve(&*store, &table, &batch.columns)
    .await
    .map_err(Error::ingestion)?;
  let row_count = store
    .append_rows(&table, batch)
    .await
    .map_err(Error::ingestion)?;

  if let Err(e) = handle.sources.write_new(&name, bytes).await {
    return Err(compensate(&*store, &table, &name, e).await);
  }
  Ok(row_count)
}

fn conflict(table: &str, name: &str) -> Error {
  Error::Conflict(format!("{name} already exists in table {table}"))
}

/// A source is live if its file is stored or any row still carries it.
async fn source_exists<S: TableStore>(
  store: &S,
  table: &str,
  handle: &TableHandle,
  name: &str,
) -> Result<bool> {
  if handle.sources.contains(name).await.map_err(Error::ingestion)? {
    return Ok(true);
  }
  store.has_origin(table, name).await.map_err(Error::ingestion)
}

/// Undo the row append after the provenance write failed, and turn the
/// failure into the error returned to the caller.
async fn compensate<S: TableStore>(store: &S, table: &str, name: &str, cause: Error) -> Error {
  match store.delete_origin(table, name).await {
    Ok(removed) => {
      tracing::warn!(table, source = %name, removed, error = %cause, "stored file write failed, rows removed");
      Error::IngestionFailure(format!("storing {name} failed: {cause}"))
    }
    Err(cleanup) => {
      tracing::error!(table, source = %name, error = %cause, %cleanup, "stored file write failed and row cleanup failed");
      Error::IngestionFailure(format!(
        "storing {name} failed: {cause}; removing its rows also failed: {cleanup}"
      ))
    }
  }
}
