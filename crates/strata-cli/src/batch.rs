//! Bulk upload of CSV files to one table.
//!
//! Files are sent one at a time with a pause between them. A duplicate
//! (HTTP 409) is counted as skipped; any other failure is counted and the
//! run continues with the next file.

use std::{
  fmt,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};

use crate::client::{ApiClient, UploadOutcome};

/// Per-run tallies printed at the end of `strata upload`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
  pub processed: usize,
  pub uploaded:  usize,
  pub skipped:   usize,
  pub failed:    usize,
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Upload summary:")?;
    writeln!(f, "  processed: {}", self.processed)?;
    writeln!(f, "  uploaded:  {}", self.uploaded)?;
    writeln!(f, "  skipped:   {}", self.skipped)?;
    write!(f, "  failed:    {}", self.failed)
  }
}

/// Expand `paths` into the list of files to upload.
///
/// Files are taken as given. Directories contribute their `*.csv` entries
/// (not recursive), sorted by name.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for path in paths {
    if !path.is_dir() {
      files.push(path.clone());
      continue;
    }

    let mut found = Vec::new();
    for entry in std::fs::read_dir(path)
      .with_context(|| format!("reading directory {}", path.display()))?
    {
      let entry_path = entry?.path();
      if entry_path.is_file() && is_csv(&entry_path) {
        found.push(entry_path);
      }
    }
    found.sort();
    files.extend(found);
  }
  Ok(files)
}

fn is_csv(path: &Path) -> bool {
  path
    .extension()
    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Upload every file in `files` to `table`, sleeping `delay` between files.
pub async fn upload_all(
  client: &ApiClient,
  table: &str,
  files: &[PathBuf],
  delay: Duration,
) -> Summary {
  let mut summary = Summary::default();

  for (i, path) in files.iter().enumerate() {
    if i > 0 && !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    summary.processed += 1;

    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();

    match upload_one(client, table, path, &file_name).await {
      Ok(UploadOutcome::Uploaded(receipt)) => {
        println!("uploaded {} ({} rows)", receipt.file_name, receipt.row_count);
        summary.uploaded += 1;
      }
      Ok(UploadOutcome::Duplicate(message)) => {
        println!("skipped  {file_name}: {message}");
        summary.skipped += 1;
      }
      Err(e) => {
        println!("failed   {file_name}: {e:#}");
        tracing::debug!(path = %path.display(), error = ?e, "upload failed");
        summary.failed += 1;
      }
    }
  }

  summary
}

async fn upload_one(
  client: &ApiClient,
  table: &str,
  path: &Path,
  file_name: &str,
) -> Result<UploadOutcome> {
  let bytes = tokio::fs::read(path)
    .await
    .with_context(|| format!("reading {}", path.display()))?;
  client.upload(table, file_name, bytes).await
}
