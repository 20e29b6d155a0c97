//! The provenance store: one directory of original uploads per table.
//!
//! The stored file is the only durable copy of the bytes a client sent;
//! rows can be rebuilt from it but not the other way around. Files are named
//! by their normalised upload name, which is also the `origin_file` value of
//! the rows they produced.

use std::{
  io::{self, Write as _},
  path::{Path, PathBuf},
};

use bytes::Bytes;
use tempfile::NamedTempFile;

use crate::{Error, Result};

// ─── File names ──────────────────────────────────────────────────────────────

/// Reduce an uploaded file name to a safe, flat name.
///
/// Non-ASCII characters are dropped, path separators and whitespace runs
/// become `_`, anything outside `[A-Za-z0-9_.-]` is removed, and leading or
/// trailing `.`/`_` are stripped. May return an empty string.
pub fn normalize_file_name(raw: &str) -> String {
  let spaced: String = raw
    .chars()
    .filter(char::is_ascii)
    .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
    .collect();

  spaced
    .split_whitespace()
    .collect::<Vec<_>>()
    .join("_")
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    .collect::<String>()
    .trim_matches(|c| c == '.' || c == '_')
    .to_string()
}

/// Whether `name` ends in one of `accepted` (case-insensitive, without dot).
pub fn has_accepted_extension(name: &str, accepted: &[String]) -> bool {
  name
    .rsplit_once('.')
    .is_some_and(|(stem, ext)| {
      !stem.is_empty() && accepted.iter().any(|a| a.eq_ignore_ascii_case(ext))
    })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Original uploads for a single table.
#[derive(Debug, Clone)]
pub struct ProvenanceStore {
  dir: PathBuf,
}

impl ProvenanceStore {
  /// Open the directory, creating it if needed.
  pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    tokio::fs::create_dir_all(&dir).await?;
    Ok(Self { dir })
  }

  pub fn dir(&self) -> &Path { &self.dir }

  fn path_of(&self, name: &str) -> PathBuf { self.dir.join(name) }

  pub async fn contains(&self, name: &str) -> Result<bool> {
    Ok(tokio::fs::try_exists(self.path_of(name)).await?)
  }

  /// Write `bytes` under `name`, failing with `Conflict` if the name is
  /// taken.
  ///
  /// Content goes to a temporary file in the same directory first and is
  /// then linked into place without clobbering, so readers never observe a
  /// partial file and a failed write leaves nothing behind.
  pub async fn write_new(&self, name: &str, bytes: Bytes) -> Result<()> {
    let dir = self.dir.clone();
    let target = self.path_of(name);

    tokio::task::spawn_blocking(move || -> Result<()> {
      let mut tmp = NamedTempFile::new_in(&dir)?;
      tmp.write_all(&bytes)?;
      tmp.as_file().sync_all()?;
      tmp.persist_noclobber(&target).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
          Error::Conflict(target.display().to_string())
        } else {
          Error::from(e.error)
        }
      })?;
      Ok(())
    })
    .await
    .map_err(Error::storage)?
  }

  /// The stored bytes, or `None` if there is no such file.
  pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(self.path_of(name)).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  /// Remove the file. Returns `false` if it did not exist.
  pub async fn remove(&self, name: &str) -> Result<bool> {
    match tokio::fs::remove_file(self.path_of(name)).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e.into()),
    }
  }

  /// Names of stored files, sorted. In-flight temporary files (dot-prefixed)
  /// are skipped.
  pub async fn list(&self) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(&self.dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      if !entry.file_type().await?.is_file() {
        continue;
      }
      if let Some(name) = entry.file_name().to_str()
        && !name.starts_with('.')
      {
        names.push(name.to_owned());
      }
    }
    names.sort();
    Ok(names)
  }
}
