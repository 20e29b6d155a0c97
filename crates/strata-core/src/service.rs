//! [`TableService`] and the operations it exposes to callers.
//!
//! The service owns the registry, one [`ProvenanceStore`] and one write lock
//! per registered table, and a [`TableStore`] backend. Ingestion lives in
//! [`crate::ingest`]; everything else is here.

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
  Error, Result,
  filter::Filter,
  provenance::{ProvenanceStore, normalize_file_name},
  registry::TableRegistry,
  row::Row,
  schema::Schema,
  store::TableStore,
  tabular,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Tunables for [`TableService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
  /// Upload extensions accepted, without the dot. Compared case-insensitively.
  pub accepted_extensions: Vec<String>,
}

impl Default for ServiceOptions {
  fn default() -> Self {
    Self { accepted_extensions: vec!["csv".to_string()] }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
  pub table:     String,
  pub file_name: String,
  pub row_count: u64,
}

/// Outcome of a source deletion. Both counts are zero for unknown sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReceipt {
  pub rows_deleted: u64,
  pub file_deleted: bool,
}

/// A downloaded source.
#[derive(Debug, Clone)]
pub struct Download {
  pub file_name:   String,
  pub bytes:       Vec<u8>,
  /// `true` when the original file was missing and the content was rebuilt
  /// from stored rows. Column order and formatting may differ.
  pub regenerated: bool,
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Per-table state: the provenance directory and the exclusive write lock.
#[derive(Debug)]
pub(crate) struct TableHandle {
  pub(crate) sources: ProvenanceStore,
  pub(crate) lock:    Mutex<()>,
}

/// Store and per-table handles sit behind `Arc`s so the commit half of an
/// upload can run on its own task (see [`crate::ingest`]).
pub struct TableService<S> {
  pub(crate) store:    Arc<S>,
  pub(crate) registry: Arc<TableRegistry>,
  pub(crate) tables:   HashMap<String, Arc<TableHandle>>,
  pub(crate) options:  ServiceOptions,
}

impl<S: TableStore> TableService<S> {
  /// Create every registered table and its provenance directory.
  pub async fn open(
    store: S,
    registry: Arc<TableRegistry>,
    options: ServiceOptions,
  ) -> Result<Self> {
    let mut tables = HashMap::new();
    for (name, dir) in registry.iter() {
      store.create_table(name).await.map_err(Error::storage)?;
      let sources = ProvenanceStore::open(dir).await?;
      tables.insert(
        name.to_owned(),
        Arc::new(TableHandle { sources, lock: Mutex::new(()) }),
      );
      tracing::debug!(table = name, dir = %dir.display(), "table ready");
    }

    Ok(Self { store: Arc::new(store), registry, tables, options })
  }

  pub fn registry(&self) -> &TableRegistry { &self.registry }

  pub fn store(&self) -> &S { &self.store }

  pub(crate) fn handle(&self, table: &str) -> Result<&Arc<TableHandle>> {
    if !self.registry.validate(table) {
      return Err(Error::InvalidTable(table.to_owned()));
    }
    self
      .tables
      .get(table)
      .ok_or_else(|| Error::InvalidTable(table.to_owned()))
  }

  // ── Tables ────────────────────────────────────────────────────────────

  pub fn list_tables(&self) -> Vec<String> {
    self.registry.names().map(str::to_owned).collect()
  }

  /// The live column list of `table`.
  pub async fn schema(&self, table: &str) -> Result<Schema> {
    self.handle(table)?;
    self.store.schema(table).await.map_err(Error::storage)
  }

  // ── Sources ───────────────────────────────────────────────────────────

  /// Every source known for `table`: stored files plus any `origin_file`
  /// whose file has gone missing.
  pub async fn list_sources(&self, table: &str) -> Result<Vec<String>> {
    let handle = self.handle(table)?;

    let mut names: BTreeSet<String> = handle.sources.list().await?.into_iter().collect();
    names.extend(self.store.origins(table).await.map_err(Error::storage)?);
    Ok(names.into_iter().collect())
  }

  /// The original bytes of a source, or a CSV rebuilt from its rows if the
  /// stored file is missing.
  pub async fn download_source(&self, table: &str, file_name: &str) -> Result<Download> {
    let handle = self.handle(table)?;
    let name = normalize_file_name(file_name);
    if name.is_empty() {
      return Err(Error::NotFound(format!("source {file_name:?}")));
    }

    if let Some(bytes) = handle.sources.read(&name).await? {
      return Ok(Download { file_name: name, bytes, regenerated: false });
    }

    let rows = self
      .store
      .select(table, &Filter::by_origin(&name))
      .await
      .map_err(Error::storage)?;
    if rows.is_empty() {
      return Err(Error::NotFound(format!("source {name:?} in table {table:?}")));
    }

    let schema = self.store.schema(table).await.map_err(Error::storage)?;
    let columns: Vec<&str> = schema
      .data_columns()
      .filter(|c| rows.iter().any(|r| r.get(c).is_some()))
      .collect();
    let bytes = tabular::render(&columns, &rows)?;

    tracing::warn!(table, source = %name, rows = rows.len(), "stored file missing, regenerated from rows");
    Ok(Download { file_name: name, bytes, regenerated: true })
  }

  /// Remove every row of a source and its stored file. Unknown sources are
  /// not an error.
  pub async fn delete_source(&self, table: &str, file_name: &str) -> Result<DeleteReceipt> {
    let handle = self.handle(table)?;
    let name = normalize_file_name(file_name);
    if name.is_empty() {
      return Ok(DeleteReceipt { rows_deleted: 0, file_deleted: false });
    }

    let _guard = handle.lock.lock().await;

    let rows_deleted = self
      .store
      .delete_origin(table, &name)
      .await
      .map_err(Error::storage)?;
    let file_deleted = handle.sources.remove(&name).await?;

    tracing::info!(table, source = %name, rows_deleted, file_deleted, "source deleted");
    Ok(DeleteReceipt { rows_deleted, file_deleted })
  }

  // ── Rows ──────────────────────────────────────────────────────────────

  /// Rows of `table` where every filtered column equals its value.
  pub async fn query(
    &self,
    table: &str,
    filters: BTreeMap<String, String>,
  ) -> Result<Vec<Row>> {
    self.handle(table)?;
    let schema = self.store.schema(table).await.map_err(Error::storage)?;
    let filter = Filter::validate(&schema, filters)?;
    self.store.select(table, &filter).await.map_err(Error::storage)
  }

  pub async fn get_row(&self, table: &str, id: i64) -> Result<Row> {
    self.handle(table)?;
    self
      .store
      .get_row(table, id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("row {id} in table {table:?}")))
  }
}
