//! HTTP server assembly for Strata.
//!
//! Turns a deserialised [`ServerConfig`] into a [`TableRegistry`] and
//! [`ServiceOptions`], and wraps the [`strata_api`] router with request
//! tracing and the upload body limit.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, extract::DefaultBodyLimit};
use serde::Deserialize;
use strata_core::{ServiceOptions, TableRegistry, TableService, TableStore};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `STRATA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub database_path:       PathBuf,
  /// Base directory for tables configured without an explicit directory.
  pub upload_root:         PathBuf,
  /// Table name to storage directory. An empty directory means
  /// `upload_root/<name>`.
  pub tables:              BTreeMap<String, PathBuf>,
  pub accepted_extensions: Vec<String>,
  pub max_upload_bytes:    usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                3000,
      database_path:       PathBuf::from("database.db"),
      upload_root:         PathBuf::from("uploads"),
      tables:              BTreeMap::new(),
      accepted_extensions: ServiceOptions::default().accepted_extensions,
      max_upload_bytes:    64 * 1024 * 1024,
    }
  }
}

impl ServerConfig {
  /// Resolve every configured table to its storage directory.
  pub fn registry(&self) -> strata_core::Result<TableRegistry> {
    let upload_root = expand_tilde(&self.upload_root);
    TableRegistry::new(self.tables.iter().map(|(name, dir)| {
      let dir = if dir.as_os_str().is_empty() {
        upload_root.join(name)
      } else {
        expand_tilde(dir)
      };
      (name.clone(), dir)
    }))
  }

  pub fn service_options(&self) -> ServiceOptions {
    ServiceOptions {
      accepted_extensions: self.accepted_extensions.clone(),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the served [`Router`]: the API routes plus tracing and the
/// request body limit.
pub fn router<S>(service: Arc<TableService<S>>, max_upload_bytes: usize) -> Router
where
  S: TableStore + 'static,
{
  strata_api::api_router(service)
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .layer(TraceLayer::new_for_http())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
