//! JSON REST API for Strata.
//!
//! Exposes an axum [`Router`] backed by a [`TableService`] over any
//! [`TableStore`]. TLS, body limits and request tracing are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(strata_api::api_router(service.clone()))
//! ```

pub mod error;
pub mod rows;
pub mod sources;
pub mod tables;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use strata_core::{TableService, TableStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<TableService<S>>) -> Router<()>
where
  S: TableStore + 'static,
{
  Router::new()
    // Tables
    .route("/tables", get(tables::list::<S>))
    .route("/tables/{table}/schema", get(tables::schema::<S>))
    // Sources
    .route("/upload/{table}", post(sources::upload::<S>))
    .route("/tables/{table}/sources", get(sources::list::<S>))
    .route(
      "/tables/{table}/sources/{file_name}",
      get(sources::download::<S>).delete(sources::delete::<S>),
    )
    // Rows
    .route("/tables/{table}/rows", get(rows::query::<S>))
    .route("/tables/{table}/rows/{id}", get(rows::get_one::<S>))
    .with_state(service)
}

// ─── Integration tests ────────────────────────────────────────────────────────
