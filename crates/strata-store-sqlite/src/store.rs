//! [`SqliteStore`], the SQLite implementation of [`TableStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, types::ValueRef};
use strata_core::{
  filter::Filter,
  row::{Row, RowBatch},
  schema::{ID_COLUMN, ORIGIN_COLUMN, Schema},
  store::TableStore,
};

use crate::{
  Error, Result,
  query::{insert_sql, quote_ident, select_sql},
  schema::{PRAGMAS, TABLE_COLUMNS_SQL, add_column_sql, create_table_sql},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Strata table store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a database at `path` and apply connection pragmas.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn table_columns(conn: &rusqlite::Connection, table: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(TABLE_COLUMNS_SQL)?;
  let columns = stmt
    .query_map(rusqlite::params![table], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(columns)
}

/// Render any stored value as text; SQLite may hand back integers for `id`
/// or for values written by other tools.
fn cell_text(value: ValueRef<'_>) -> Option<String> {
  match value {
    ValueRef::Null => None,
    ValueRef::Integer(i) => Some(i.to_string()),
    ValueRef::Real(f) => Some(f.to_string()),
    ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
  }
}

/// Run a `SELECT *` statement and collect its rows in column order.
fn read_rows(
  conn: &rusqlite::Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Row>> {
  let mut stmt = conn.prepare(sql)?;
  let names: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
  let id_idx = names.iter().position(|n| n == ID_COLUMN);

  let mut rows = stmt.query(params)?;
  let mut out = Vec::new();
  while let Some(r) = rows.next()? {
    let id: i64 = match id_idx {
      Some(i) => r.get(i)?,
      None => 0,
    };
    let mut values = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
      if Some(i) != id_idx {
        values.push((name.clone(), cell_text(r.get_ref(i)?)));
      }
    }
    out.push(Row { id, values });
  }
  Ok(out)
}

// ─── TableStore impl ─────────────────────────────────────────────────────────

impl TableStore for SqliteStore {
  type Error = Error;

  // ── Schema ────────────────────────────────────────────────────────────────

  async fn create_table(&self, table: &str) -> Result<()> {
    let sql = create_table_sql(table);
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn schema(&self, table: &str) -> Result<Schema> {
    let name = table.to_owned();
    let columns = self
      .conn
      .call(move |conn| Ok(table_columns(conn, &name)?))
      .await?;

    if columns.is_empty() {
      return Err(Error::UnknownTable(table.to_owned()));
    }
    Ok(Schema::new(columns))
  }

  async fn add_column(&self, table: &str, column: &str) -> Result<bool> {
    let name = table.to_owned();
    let column = column.to_owned();
    let sql = add_column_sql(&name, &column);

    let added = self
      .conn
      .call(move |conn| {
        let existing = table_columns(conn, &name)?;
        if existing.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
          return Ok(false);
        }
        conn.execute(&sql, [])?;
        Ok(true)
      })
      .await?;
    Ok(added)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn append_rows(&self, table: &str, batch: RowBatch) -> Result<u64> {
    let expected = batch.columns.len();
    if let Some((row, cells)) = batch
      .rows
      .iter()
      .enumerate()
      .find(|(_, cells)| cells.len() != expected)
    {
      return Err(Error::RaggedRow { row, found: cells.len(), expected });
    }

    let sql = insert_sql(table, &batch.columns);
    let rows = batch.rows;

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&sql)?;
          for cells in &rows {
            stmt.execute(rusqlite::params_from_iter(cells.iter()))?;
          }
        }
        tx.commit()?;
        Ok(rows.len() as u64)
      })
      .await?;

    tracing::debug!(table, rows = written, "rows appended");
    Ok(written)
  }

  async fn delete_origin(&self, table: &str, origin: &str) -> Result<u64> {
    let sql = format!(
      "DELETE FROM {} WHERE {} = ?1",
      quote_ident(table),
      quote_ident(ORIGIN_COLUMN)
    );
    let origin = origin.to_owned();

    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![origin])?))
      .await?;
    Ok(removed as u64)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
    let (sql, params) = select_sql(table, filter);

    let rows = self
      .conn
      .call(move |conn| Ok(read_rows(conn, &sql, rusqlite::params_from_iter(params.iter()))?))
      .await?;
    Ok(rows)
  }

  async fn get_row(&self, table: &str, id: i64) -> Result<Option<Row>> {
    let sql = format!(
      "SELECT * FROM {} WHERE {} = ?1",
      quote_ident(table),
      quote_ident(ID_COLUMN)
    );

    let rows = self
      .conn
      .call(move |conn| Ok(read_rows(conn, &sql, rusqlite::params![id])?))
      .await?;
    Ok(rows.into_iter().next())
  }

  async fn origins(&self, table: &str) -> Result<Vec<String>> {
    let sql = format!(
      "SELECT DISTINCT {origin} FROM {} ORDER BY {origin}",
      quote_ident(table),
      origin = quote_ident(ORIGIN_COLUMN)
    );

    let names = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let names = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
      })
      .await?;
    Ok(names)
  }

  async fn has_origin(&self, table: &str, origin: &str) -> Result<bool> {
    let sql = format!(
      "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
      quote_ident(table),
      quote_ident(ORIGIN_COLUMN)
    );
    let origin = origin.to_owned();

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![origin], |_| Ok(true))
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }
}
