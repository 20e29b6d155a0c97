//! Equality filters validated against a live [`Schema`].
//!
//! A [`Filter`] can only be built from column names that exist in the table,
//! so a storage backend may treat every column it holds as a trusted
//! identifier. Values are never trusted and must be bound as parameters.

use std::collections::BTreeMap;

use crate::{
  Error, Result,
  schema::{ORIGIN_COLUMN, Schema},
};

/// A conjunction of `column = value` terms. Empty means "all rows".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  terms: Vec<(String, String)>,
}

impl Filter {
  /// Validate caller-supplied filters. Keys are checked in sorted order so
  /// the reported column is deterministic.
  pub fn validate(schema: &Schema, filters: BTreeMap<String, String>) -> Result<Self> {
    if let Some(unknown) = filters.keys().find(|k| !schema.contains(k)) {
      return Err(Error::InvalidColumn(format!("{unknown:?} is not a column")));
    }
    Ok(Self { terms: filters.into_iter().collect() })
  }

  /// Collect raw `column=value` pairs (e.g. a query string). A column given
  /// twice is rejected rather than letting one value silently win.
  pub fn collect_pairs<I>(pairs: I) -> Result<BTreeMap<String, String>>
  where
    I: IntoIterator<Item = (String, String)>,
  {
    let mut filters = BTreeMap::new();
    for (column, value) in pairs {
      if filters.contains_key(&column) {
        return Err(Error::InvalidColumn(format!("{column:?} is filtered more than once")));
      }
      filters.insert(column, value);
    }
    Ok(filters)
  }

  /// Match every row of one source. `origin_file` always exists.
  pub fn by_origin(file_name: &str) -> Self {
    Self {
      terms: vec![(ORIGIN_COLUMN.to_string(), file_name.to_string())],
    }
  }

  pub fn is_empty(&self) -> bool { self.terms.is_empty() }

  pub fn terms(&self) -> &[(String, String)] { &self.terms }
}
