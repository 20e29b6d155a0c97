//! SQLite backend for Strata.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each registered table is one SQLite
//! table; its columns grow through `ALTER TABLE ... ADD COLUMN`.

mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
