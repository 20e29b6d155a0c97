//! Live schema descriptors and additive schema evolution.
//!
//! A [`Schema`] is fetched fresh from the store on every request; nothing
//! caches it. Evolution only ever adds nullable text columns.

use serde::{Deserialize, Serialize};

use crate::store::TableStore;

/// System-assigned row identity. Always the first column.
pub const ID_COLUMN: &str = "id";

/// Name of the uploaded file a row came from. Always present.
pub const ORIGIN_COLUMN: &str = "origin_file";

/// The ordered column list of a table as it currently exists in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
  pub columns: Vec<String>,
}

impl Schema {
  pub fn new(columns: Vec<String>) -> Self { Self { columns } }

  pub fn contains(&self, column: &str) -> bool {
    self.columns.iter().any(|c| c == column)
  }

  /// Columns holding uploaded data, i.e. everything but `id` and
  /// `origin_file`.
  pub fn data_columns(&self) -> impl Iterator<Item = &str> {
    self
      .columns
      .iter()
      .map(String::as_str)
      .filter(|c| *c != ID_COLUMN && *c != ORIGIN_COLUMN)
  }

  /// `candidates` not yet present, in candidate order.
  pub fn missing<'a>(&self, candidates: &'a [String]) -> Vec<&'a str> {
    candidates
      .iter()
      .map(String::as_str)
      .filter(|c| !self.contains(c))
      .collect()
  }
}

/// Ensure every name in `candidates` exists as a column of `table`.
///
/// Must be called with the table's write lock held; the schema is re-read
/// here so a column added by a previous holder is seen and skipped. Returns
/// the columns that were actually added.
pub async fn evolve<S: TableStore>(
  store: &S,
  table: &str,
  candidates: &[String],
) -> Result<Vec<String>, S::Error> {
  let current = store.schema(table).await?;
  let missing = current.missing(candidates);

  let mut added = Vec::with_capacity(missing.len());
  for column in missing {
    if store.add_column(table, column).await? {
      added.push(column.to_owned());
    }
  }

  if !added.is_empty() {
    tracing::debug!(table, ?added, "schema evolved");
  }
  Ok(added)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn schema(cols: &[&str]) -> Schema {
    Schema::new(cols.iter().map(|c| c.to_string()).collect())
  }

  #[test]
  fn missing_preserves_candidate_order() {
    let s = schema(&["id", "origin_file", "b"]);
    let candidates = vec!["c".to_string(), "b".to_string(), "a".to_string()];
    assert_eq!(s.missing(&candidates), ["c", "a"]);
  }

  #[test]
  fn data_columns_skip_system_columns() {
    let s = schema(&["id", "origin_file", "speed", "heading"]);
    assert_eq!(s.data_columns().collect::<Vec<_>>(), ["speed", "heading"]);
  }
}
