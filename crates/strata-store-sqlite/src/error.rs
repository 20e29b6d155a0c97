//! Error type for `strata-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("table {0:?} does not exist")]
  UnknownTable(String),

  /// A batch row whose cell count differs from the batch's column count.
  #[error("row {row} has {found} cells, expected {expected}")]
  RaggedRow {
    row:      usize,
    found:    usize,
    expected: usize,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
