//! Error types for `strata-core`.
//!
//! Every error carries a stable [`ErrorKind`] so callers (the HTTP layer, the
//! CLI) can branch on the kind without matching message text.

use serde::Serialize;
use thiserror::Error;

/// Stable, serialisable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  InvalidTable,
  InvalidFile,
  Conflict,
  InvalidColumn,
  NotFound,
  IngestionFailure,
  StorageError,
  Config,
}

#[derive(Debug, Error)]
pub enum Error {
  /// The table name is not in the registry.
  #[error("unknown table: {0:?}")]
  InvalidTable(String),

  /// Missing or empty file name, or a disallowed extension.
  #[error("invalid file: {0}")]
  InvalidFile(String),

  /// A source with this file name already exists in the table.
  #[error("source already exists: {0}")]
  Conflict(String),

  /// A filter names a column that is not in the live schema, or names the
  /// same column twice.
  #[error("invalid filter column: {0}")]
  InvalidColumn(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// Parse, sanitize or storage failure while ingesting a file.
  #[error("ingestion failed: {0}")]
  IngestionFailure(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("configuration error: {0}")]
  Config(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::InvalidTable(_) => ErrorKind::InvalidTable,
      Error::InvalidFile(_) => ErrorKind::InvalidFile,
      Error::Conflict(_) => ErrorKind::Conflict,
      Error::InvalidColumn(_) => ErrorKind::InvalidColumn,
      Error::NotFound(_) => ErrorKind::NotFound,
      Error::IngestionFailure(_) => ErrorKind::IngestionFailure,
      Error::Storage(_) => ErrorKind::StorageError,
      Error::Config(_) => ErrorKind::Config,
    }
  }

  /// Wrap a backend error.
  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Storage(Box::new(e))
  }

  /// Wrap a backend error that happened mid-ingestion.
  pub fn ingestion<E: std::fmt::Display>(e: E) -> Self {
    Error::IngestionFailure(e.to_string())
  }
}

impl From<std::io::Error> for Error {
  fn from(e: std::io::Error) -> Self { Error::Storage(Box::new(e)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
