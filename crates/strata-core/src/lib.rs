//! Core types and the ingestion/query service for Strata.
//!
//! Strata stores uploaded CSV files in a fixed set of tables whose columns
//! grow as new files bring new headers. This crate holds the column
//! sanitizer, the table registry, schema evolution, the provenance store, and
//! [`TableService`], which ties them together over any [`TableStore`]
//! backend. It has no HTTP or database dependencies.

pub mod error;
pub mod filter;
pub mod ingest;
pub mod provenance;
pub mod registry;
pub mod row;
pub mod sanitize;
pub mod schema;
pub mod service;
pub mod store;
pub mod tabular;

pub use error::{Error, ErrorKind, Result};
pub use registry::TableRegistry;
pub use service::{DeleteReceipt, Download, ServiceOptions, TableService, UploadReceipt};
pub use store::TableStore;

#[cfg(test)]
mod tests;
