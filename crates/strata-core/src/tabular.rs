//! CSV reading and writing.
//!
//! Turns raw upload bytes into an ordered header list and rows of optional
//! strings, and renders stored rows back into CSV when an original file is
//! no longer available.

use csv::{ReaderBuilder, WriterBuilder};

use crate::{Error, Result, row::Row};

/// A parsed CSV file. Every record has exactly `headers.len()` cells; empty
/// cells and cells missing from short lines are `None`.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
  pub headers: Vec<String>,
  pub records: Vec<Vec<Option<String>>>,
}

/// Parse `bytes` as comma-separated UTF-8 with a header line.
///
/// A leading UTF-8 BOM is ignored. A record with more fields than the header
/// is an error; a record with fewer is padded with nulls.
pub fn parse(bytes: &[u8]) -> Result<CsvTable> {
  let mut reader = ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .from_reader(bytes);

  let headers: Vec<String> = reader
    .headers()
    .map_err(Error::ingestion)?
    .iter()
    .map(str::to_owned)
    .collect();

  if headers.is_empty() {
    return Err(Error::IngestionFailure("file has no header line".to_string()));
  }

  let mut records = Vec::new();
  for result in reader.records() {
    let record = result.map_err(Error::ingestion)?;
    if record.len() > headers.len() {
      let line = record.position().map(|p| p.line()).unwrap_or_default();
      return Err(Error::IngestionFailure(format!(
        "line {line} has {} fields, expected {}",
        record.len(),
        headers.len()
      )));
    }

    let mut cells: Vec<Option<String>> = record
      .iter()
      .map(|cell| (!cell.is_empty()).then(|| cell.to_owned()))
      .collect();
    cells.resize(headers.len(), None);
    records.push(cells);
  }

  Ok(CsvTable { headers, records })
}

/// Render `rows` as CSV with the given header. Null cells are written empty.
pub fn render(columns: &[&str], rows: &[Row]) -> Result<Vec<u8>> {
  let mut writer = WriterBuilder::new().from_writer(Vec::new());

  writer.write_record(columns).map_err(Error::storage)?;
  for row in rows {
    writer
      .write_record(columns.iter().map(|c| row.get(c).unwrap_or("")))
      .map_err(Error::storage)?;
  }

  writer.into_inner().map_err(|e| Error::storage(e.into_error()))
}
