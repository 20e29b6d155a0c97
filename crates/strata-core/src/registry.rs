//! The table registry, the fixed set of logical tables this process serves.
//!
//! Built once at startup from configuration and shared behind an `Arc`.
//! There is no way to mutate it afterwards.

use std::{
  collections::{BTreeMap, HashSet},
  path::{Path, PathBuf},
};

use crate::{Error, Result, sanitize::is_identifier};

#[derive(Debug, Clone)]
pub struct TableRegistry {
  tables: BTreeMap<String, PathBuf>,
}

impl TableRegistry {
  /// Build a registry from `(name, storage directory)` pairs.
  ///
  /// Names must be sanitized identifiers, and no two tables may share a
  /// directory.
  pub fn new<I, N, P>(entries: I) -> Result<Self>
  where
    I: IntoIterator<Item = (N, P)>,
    N: Into<String>,
    P: Into<PathBuf>,
  {
    let mut tables = BTreeMap::new();
    let mut dirs = HashSet::new();

    for (name, dir) in entries {
      let name: String = name.into();
      let dir: PathBuf = dir.into();

      if !is_identifier(&name) {
        return Err(Error::Config(format!(
          "table name {name:?} must match [a-z0-9_]+"
        )));
      }
      if name.starts_with("sqlite_") {
        return Err(Error::Config(format!(
          "table name {name:?} uses the reserved sqlite_ prefix"
        )));
      }
      if !dirs.insert(dir.clone()) {
        return Err(Error::Config(format!(
          "storage directory {} is shared by more than one table",
          dir.display()
        )));
      }
      if tables.insert(name.clone(), dir).is_some() {
        return Err(Error::Config(format!("table {name:?} registered twice")));
      }
    }

    if tables.is_empty() {
      return Err(Error::Config("no tables configured".to_string()));
    }

    Ok(Self { tables })
  }

  pub fn validate(&self, name: &str) -> bool { self.tables.contains_key(name) }

  /// The provenance directory for `name`.
  pub fn storage_dir(&self, name: &str) -> Result<&Path> {
    self
      .tables
      .get(name)
      .map(PathBuf::as_path)
      .ok_or_else(|| Error::NotFound(format!("table {name:?}")))
  }

  /// Registered names in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.tables.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
    self.tables.iter().map(|(n, d)| (n.as_str(), d.as_path()))
  }
}
