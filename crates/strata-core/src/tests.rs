//! Pipeline tests for `TableService` against an in-memory `TableStore`.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
  time::Duration,
};

use bytes::Bytes;
use tempfile::TempDir;

use crate::{
  Error, ServiceOptions, TableRegistry, TableService, TableStore,
  filter::Filter,
  row::{Row, RowBatch},
  schema::{ID_COLUMN, ORIGIN_COLUMN, Schema},
};

// ─── In-memory store ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MemError(String);

#[derive(Default)]
struct MemTable {
  columns: Vec<String>,
  rows:    Vec<(i64, HashMap<String, String>)>,
  next_id: i64,
}

impl MemTable {
  fn to_row(&self, id: i64, cells: &HashMap<String, String>) -> Row {
    Row {
      id,
      values: self
        .columns
        .iter()
        .filter(|c| *c != ID_COLUMN)
        .map(|c| (c.clone(), cells.get(c).cloned()))
        .collect(),
    }
  }
}

#[derive(Default)]
struct MemoryStore {
  tables:          Mutex<HashMap<String, MemTable>>,
  fail_append:     AtomicBool,
  fail_has_origin: AtomicBool,
  /// Pause after an append has been committed, before returning.
  append_delay_ms: AtomicU64,
}

impl MemoryStore {
  fn with<T>(&self, table: &str, f: impl FnOnce(&mut MemTable) -> T) -> Result<T, MemError> {
    let mut tables = self.tables.lock().unwrap();
    let t = tables
      .get_mut(table)
      .ok_or_else(|| MemError(format!("no table {table}")))?;
    Ok(f(t))
  }
}

impl TableStore for MemoryStore {
  type Error = MemError;

  async fn create_table(&self, table: &str) -> Result<(), MemError> {
    self
      .tables
      .lock()
      .unwrap()
      .entry(table.to_owned())
      .or_insert_with(|| MemTable {
        columns: vec![ID_COLUMN.into(), ORIGIN_COLUMN.into()],
        rows:    vec![],
        next_id: 1,
      });
    Ok(())
  }

  async fn schema(&self, table: &str) -> Result<Schema, MemError> {
    self.with(table, |t| Schema::new(t.columns.clone()))
  }

  async fn add_column(&self, table: &str, column: &str) -> Result<bool, MemError> {
    self.with(table, |t| {
      if t.columns.iter().any(|c| c == column) {
        false
      } else {
        t.columns.push(column.to_owned());
        true
      }
    })
  }

  async fn append_rows(&self, table: &str, batch: RowBatch) -> Result<u64, MemError> {
    if self.fail_append.load(Ordering::SeqCst) {
      return Err(MemError("disk full".into()));
    }
    let written = self.with(table, |t| {
      for cells in &batch.rows {
        let id = t.next_id;
        t.next_id += 1;
        let map = batch
          .columns
          .iter()
          .zip(cells)
          .filter_map(|(c, v)| v.clone().map(|v| (c.clone(), v)))
          .collect();
        t.rows.push((id, map));
      }
      batch.rows.len() as u64
    })?;

    let delay = self.append_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
      tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Ok(written)
  }

  async fn delete_origin(&self, table: &str, origin: &str) -> Result<u64, MemError> {
    self.with(table, |t| {
      let before = t.rows.len();
      t.rows
        .retain(|(_, cells)| cells.get(ORIGIN_COLUMN).map(String::as_str) != Some(origin));
      (before - t.rows.len()) as u64
    })
  }

  async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, MemError> {
    self.with(table, |t| {
      t.rows
        .iter()
        .map(|(id, cells)| t.to_row(*id, cells))
        .filter(|row| {
          filter.terms().iter().all(|(c, v)| {
            if c == ID_COLUMN {
              row.id.to_string() == *v
            } else {
              row.get(c) == Some(v.as_str())
            }
          })
        })
        .collect()
    })
  }

  async fn get_row(&self, table: &str, id: i64) -> Result<Option<Row>, MemError> {
    self.with(table, |t| {
      t.rows
        .iter()
        .find(|(rid, _)| *rid == id)
        .map(|(rid, cells)| t.to_row(*rid, cells))
    })
  }

  async fn origins(&self, table: &str) -> Result<Vec<String>, MemError> {
    self.with(table, |t| {
      let mut names: Vec<String> = t
        .rows
        .iter()
        .filter_map(|(_, cells)| cells.get(ORIGIN_COLUMN).cloned())
        .collect();
      names.sort();
      names.dedup();
      names
    })
  }

  async fn has_origin(&self, table: &str, origin: &str) -> Result<bool, MemError> {
    if self.fail_has_origin.load(Ordering::SeqCst) {
      return Err(MemError("read failed".into()));
    }
    self.with(table, |t| {
      t.rows
        .iter()
        .any(|(_, cells)| cells.get(ORIGIN_COLUMN).map(String::as_str) == Some(origin))
    })
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct Fixture {
  service: Arc<TableService<MemoryStore>>,
  dir:     TempDir,
}

async fn fixture() -> Fixture {
  let dir = tempfile::tempdir().unwrap();
  let registry = TableRegistry::new([
    ("boat_data", dir.path().join("boat_data")),
    ("weather", dir.path().join("weather")),
  ])
  .unwrap();
  let service = TableService::open(
    MemoryStore::default(),
    Arc::new(registry),
    ServiceOptions::default(),
  )
  .await
  .unwrap();
  Fixture { service: Arc::new(service), dir }
}

fn csv(s: &'static str) -> Bytes { Bytes::from_static(s.as_bytes()) }

fn no_filters() -> BTreeMap<String, String> { BTreeMap::new() }

fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ─── Upload ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn boat_data_scenario() {
  let f = fixture().await;
  let s = &f.service;

  let receipt = s
    .upload("boat_data", "a.csv", csv("Speed,Heading\n12,90\n"))
    .await
    .unwrap();
  assert_eq!(receipt.row_count, 1);

  let rows = s.query("boat_data", no_filters()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].id, 1);
  assert_eq!(rows[0].get("speed"), Some("12"));
  assert_eq!(rows[0].get("heading"), Some("90"));
  assert_eq!(rows[0].get("origin_file"), Some("a.csv"));

  s.upload("boat_data", "b.csv", csv("Speed,Depth\n7,3\n"))
    .await
    .unwrap();
  assert!(s.schema("boat_data").await.unwrap().contains("depth"));

  let fast = s
    .query("boat_data", filters(&[("speed", "12")]))
    .await
    .unwrap();
  assert_eq!(fast.len(), 1);
  assert_eq!(fast[0].id, 1);
}

#[tokio::test]
async fn schema_grows_and_old_rows_read_null() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "one.csv", csv("A,B\n1,2\n")).await.unwrap();
  s.upload("boat_data", "two.csv", csv("B,C\n3,4\n")).await.unwrap();

  let schema = s.schema("boat_data").await.unwrap();
  assert_eq!(schema.columns, ["id", "origin_file", "a", "b", "c"]);

  let first = s
    .query("boat_data", filters(&[("origin_file", "one.csv")]))
    .await
    .unwrap();
  assert_eq!(first.len(), 1);
  assert_eq!(first[0].get("c"), None);
  assert_eq!(first[0].get("a"), Some("1"));
}

#[tokio::test]
async fn duplicate_upload_conflicts_without_side_effects() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "a.csv", csv("x\n1\n2\n")).await.unwrap();
  let err = s
    .upload("boat_data", "a.csv", csv("x,y\n3,4\n"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  assert_eq!(s.query("boat_data", no_filters()).await.unwrap().len(), 2);
  assert!(!s.schema("boat_data").await.unwrap().contains("y"));
}

#[tokio::test]
async fn same_name_in_other_table_is_fine() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "a.csv", csv("x\n1\n")).await.unwrap();
  s.upload("weather", "a.csv", csv("x\n1\n")).await.unwrap();
}

#[tokio::test]
async fn rejects_unknown_table_and_bad_file_names() {
  let f = fixture().await;
  let s = &f.service;

  let err = s.upload("nope", "a.csv", csv("x\n1\n")).await.unwrap_err();
  assert!(matches!(err, Error::InvalidTable(_)));

  for name in ["", "  ", "a.txt", "csv", "///"] {
    let err = s.upload("boat_data", name, csv("x\n1\n")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidFile(_)), "{name:?}: {err:?}");
  }
}

#[tokio::test]
async fn header_problems_leave_no_trace() {
  let f = fixture().await;
  let s = &f.service;

  for body in ["Depth (m),depth_m\n1,2\n", "ok,%%%\n1,2\n", "id,x\n1,2\n", ""] {
    let err = s
      .upload("boat_data", "bad.csv", Bytes::from(body))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::IngestionFailure(_)), "{body:?}: {err:?}");
  }

  assert_eq!(s.schema("boat_data").await.unwrap().columns, ["id", "origin_file"]);
  assert!(s.list_sources("boat_data").await.unwrap().is_empty());
}

#[tokio::test]
async fn file_name_is_normalised_everywhere() {
  let f = fixture().await;
  let s = &f.service;

  let receipt = s
    .upload("boat_data", "../My Log.csv", csv("x\n1\n"))
    .await
    .unwrap();
  assert_eq!(receipt.file_name, "My_Log.csv");

  let rows = s.query("boat_data", no_filters()).await.unwrap();
  assert_eq!(rows[0].get("origin_file"), Some("My_Log.csv"));
  assert!(f.dir.path().join("boat_data/My_Log.csv").exists());
}

#[tokio::test]
async fn failed_append_writes_no_file() {
  let f = fixture().await;
  let s = &f.service;
  s.store().fail_append.store(true, Ordering::SeqCst);

  let err = s.upload("boat_data", "a.csv", csv("x\n1\n")).await.unwrap_err();
  assert!(matches!(err, Error::IngestionFailure(_)));
  assert!(!f.dir.path().join("boat_data/a.csv").exists());
  assert!(s.list_sources("boat_data").await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_file_write_removes_rows() {
  let f = fixture().await;
  let s = &f.service;
  std::fs::remove_dir_all(f.dir.path().join("boat_data")).unwrap();

  let err = s.upload("boat_data", "a.csv", csv("x\n1\n2\n")).await.unwrap_err();
  assert!(matches!(err, Error::IngestionFailure(_)));
  assert!(s.query("boat_data", no_filters()).await.unwrap().is_empty());
  // Added columns may stay behind.
  assert!(s.schema("boat_data").await.unwrap().contains("x"));
}

#[tokio::test]
async fn dropped_upload_still_stores_its_file() {
  let f = fixture().await;
  let s = &f.service;
  s.store().append_delay_ms.store(1000, Ordering::SeqCst);

  // The caller gives up while the append is committed but before the file
  // is written.
  let dropped = tokio::time::timeout(
    Duration::from_millis(100),
    s.upload("boat_data", "a.csv", csv("x\n1\n2\n")),
  )
  .await;
  assert!(dropped.is_err());

  // Wait for the detached commit to release the table.
  drop(s.handle("boat_data").unwrap().lock.lock().await);

  assert_eq!(s.query("boat_data", no_filters()).await.unwrap().len(), 2);
  assert!(f.dir.path().join("boat_data/a.csv").exists());
  let dl = s.download_source("boat_data", "a.csv").await.unwrap();
  assert!(!dl.regenerated);
  assert!(matches!(
    s.upload("boat_data", "a.csv", csv("x\n3\n")).await,
    Err(Error::Conflict(_))
  ));
}

#[tokio::test]
async fn dropped_upload_still_compensates() {
  let f = fixture().await;
  let s = &f.service;
  s.store().append_delay_ms.store(1000, Ordering::SeqCst);
  std::fs::remove_dir_all(f.dir.path().join("boat_data")).unwrap();

  let dropped = tokio::time::timeout(
    Duration::from_millis(100),
    s.upload("boat_data", "a.csv", csv("x\n1\n")),
  )
  .await;
  assert!(dropped.is_err());

  drop(s.handle("boat_data").unwrap().lock.lock().await);

  assert!(s.query("boat_data", no_filters()).await.unwrap().is_empty());
}

#[tokio::test]
async fn storage_error_during_duplicate_check_is_an_ingestion_failure() {
  let f = fixture().await;
  let s = &f.service;
  s.store().fail_has_origin.store(true, Ordering::SeqCst);

  let err = s.upload("boat_data", "a.csv", csv("x\n1\n")).await.unwrap_err();
  assert!(matches!(err, Error::IngestionFailure(_)), "{err:?}");
  assert!(!f.dir.path().join("boat_data/a.csv").exists());
}

#[tokio::test]
async fn concurrent_uploads_of_one_name_admit_one() {
  let f = fixture().await;

  let a = {
    let s = f.service.clone();
    tokio::spawn(async move { s.upload("boat_data", "a.csv", csv("x\n1\n")).await })
  };
  let b = {
    let s = f.service.clone();
    tokio::spawn(async move { s.upload("boat_data", "a.csv", csv("x\n2\n")).await })
  };
  let (a, b) = (a.await.unwrap(), b.await.unwrap());

  assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
  assert!([&a, &b].iter().any(|r| matches!(r, Err(Error::Conflict(_)))));
  assert_eq!(f.service.query("boat_data", no_filters()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_uploads_share_new_column() {
  let f = fixture().await;

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let s = f.service.clone();
      tokio::spawn(async move {
        s.upload("boat_data", &format!("f{i}.csv"), csv("Wind\n5\n")).await
      })
    })
    .collect();
  for h in handles {
    h.await.unwrap().unwrap();
  }

  let schema = f.service.schema("boat_data").await.unwrap();
  assert_eq!(schema.columns, ["id", "origin_file", "wind"]);
  assert_eq!(f.service.query("boat_data", no_filters()).await.unwrap().len(), 8);
}

// ─── Sources ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_sources_includes_uploads() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "b.csv", csv("x\n1\n")).await.unwrap();
  s.upload("boat_data", "a.csv", csv("x\n1\n")).await.unwrap();
  assert_eq!(s.list_sources("boat_data").await.unwrap(), ["a.csv", "b.csv"]);
  assert!(matches!(
    s.list_sources("nope").await,
    Err(Error::InvalidTable(_))
  ));
}

#[tokio::test]
async fn download_returns_original_bytes() {
  let f = fixture().await;
  let s = &f.service;
  let body = "Speed , Heading\r\n12,\"90\"\r\n";

  s.upload("boat_data", "a.csv", Bytes::from(body)).await.unwrap();
  let dl = s.download_source("boat_data", "a.csv").await.unwrap();
  assert!(!dl.regenerated);
  assert_eq!(dl.bytes, body.as_bytes());
}

#[tokio::test]
async fn download_regenerates_when_file_is_gone() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "a.csv", csv("Speed,Heading\n12,90\n")).await.unwrap();
  s.upload("boat_data", "b.csv", csv("Depth\n3\n")).await.unwrap();
  std::fs::remove_file(f.dir.path().join("boat_data/a.csv")).unwrap();

  let dl = s.download_source("boat_data", "a.csv").await.unwrap();
  assert!(dl.regenerated);
  assert_eq!(dl.bytes, b"speed,heading\n12,90\n");

  // Still listed and still a conflict for re-upload.
  assert!(s.list_sources("boat_data").await.unwrap().contains(&"a.csv".to_string()));
  assert!(matches!(
    s.upload("boat_data", "a.csv", csv("x\n1\n")).await,
    Err(Error::Conflict(_))
  ));
}

#[tokio::test]
async fn download_unknown_is_not_found() {
  let f = fixture().await;
  let err = f.service.download_source("boat_data", "x.csv").await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn delete_is_exact_and_idempotent() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "a.csv", csv("x\n1\n2\n")).await.unwrap();
  s.upload("boat_data", "b.csv", csv("x\n3\n")).await.unwrap();

  let receipt = s.delete_source("boat_data", "a.csv").await.unwrap();
  assert_eq!(receipt.rows_deleted, 2);
  assert!(receipt.file_deleted);

  let left = s.query("boat_data", no_filters()).await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].get("origin_file"), Some("b.csv"));
  assert!(!f.dir.path().join("boat_data/a.csv").exists());

  let again = s.delete_source("boat_data", "a.csv").await.unwrap();
  assert_eq!(again.rows_deleted, 0);
  assert!(!again.file_deleted);

  // The name is free again.
  s.upload("boat_data", "a.csv", csv("x\n9\n")).await.unwrap();
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_filters_are_conjunctive() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "a.csv", csv("boat,speed\nkestrel,12\nkestrel,7\nosprey,12\n"))
    .await
    .unwrap();

  let both = s
    .query("boat_data", filters(&[("boat", "kestrel"), ("speed", "12")]))
    .await
    .unwrap();
  assert_eq!(both.len(), 1);
  assert_eq!(both[0].id, 1);

  let none = s
    .query("boat_data", filters(&[("boat", "heron")]))
    .await
    .unwrap();
  assert!(none.is_empty());
}

#[tokio::test]
async fn query_unknown_column_is_rejected() {
  let f = fixture().await;
  let err = f
    .service
    .query("boat_data", filters(&[("speed", "1")]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidColumn(c) if c.contains("\"speed\"")));
}

#[tokio::test]
async fn get_row_by_id() {
  let f = fixture().await;
  let s = &f.service;

  s.upload("boat_data", "a.csv", csv("x\n1\n2\n")).await.unwrap();
  assert_eq!(s.get_row("boat_data", 2).await.unwrap().get("x"), Some("2"));
  assert!(matches!(s.get_row("boat_data", 99).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn list_tables_is_sorted() {
  let f = fixture().await;
  assert_eq!(f.service.list_tables(), ["boat_data", "weather"]);
}
