//! Column-name normalisation.
//!
//! Raw CSV headers become storage identifiers: every character outside
//! `[A-Za-z0-9_]` is replaced with `_`, leading and trailing underscores are
//! stripped, and ASCII letters are lower-cased. SQLite compares identifiers
//! case-insensitively, so `Speed` and `speed` must land on the same column.

use std::collections::HashMap;

use crate::{
  Error, Result,
  schema::{ID_COLUMN, ORIGIN_COLUMN},
};

/// Normalise a single header. May return an empty string.
pub fn sanitize_column(raw: &str) -> String {
  let replaced: String = raw
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
    .collect();
  replaced.trim_matches('_').to_ascii_lowercase()
}

/// `true` if `name` is already a sanitized identifier.
pub fn is_identifier(name: &str) -> bool {
  !name.is_empty() && sanitize_column(name) == name
}

/// Sanitize a full header row, preserving order.
///
/// Rejects the row if any header sanitizes to nothing, if two headers collide
/// on the same identifier, or if a header would shadow a system column.
pub fn sanitize_headers<S: AsRef<str>>(headers: &[S]) -> Result<Vec<String>> {
  let mut seen: HashMap<String, &str> = HashMap::with_capacity(headers.len());
  let mut out = Vec::with_capacity(headers.len());

  for raw in headers {
    let raw = raw.as_ref();
    let name = sanitize_column(raw);

    if name.is_empty() {
      return Err(Error::IngestionFailure(format!(
        "header {raw:?} has no usable characters"
      )));
    }
    if name == ID_COLUMN || name == ORIGIN_COLUMN {
      return Err(Error::IngestionFailure(format!(
        "header {raw:?} collides with system column {name:?}"
      )));
    }
    if let Some(first) = seen.get(&name) {
      return Err(Error::IngestionFailure(format!(
        "headers {first:?} and {raw:?} both normalise to {name:?}"
      )));
    }

    seen.insert(name.clone(), raw);
    out.push(name);
  }

  Ok(out)
}
