//! DDL for the Strata SQLite store.
//!
//! Connection pragmas run once at open. Tables are created per registered
//! name with only the system columns; everything else arrives through
//! schema evolution as nullable `TEXT`.

use strata_core::schema::{ID_COLUMN, ORIGIN_COLUMN};

use crate::query::quote_ident;

pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// `CREATE TABLE IF NOT EXISTS` plus the `origin_file` index; idempotent.
///
/// `AUTOINCREMENT` keeps ids of deleted sources from being reused.
pub fn create_table_sql(table: &str) -> String {
  let t = quote_ident(table);
  let index = quote_ident(&origin_index_name(table));
  format!(
    "CREATE TABLE IF NOT EXISTS {t} (
        {id}     INTEGER PRIMARY KEY AUTOINCREMENT,
        {origin} TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS {index} ON {t}({origin});",
    id = quote_ident(ID_COLUMN),
    origin = quote_ident(ORIGIN_COLUMN),
  )
}

/// Indexes share SQLite's namespace with tables. Registered table names are
/// `[a-z0-9_]+`, so the `:` keeps this from colliding with any of them.
pub fn origin_index_name(table: &str) -> String { format!("{table}:origin_idx") }

pub fn add_column_sql(table: &str, column: &str) -> String {
  format!(
    "ALTER TABLE {} ADD COLUMN {} TEXT",
    quote_ident(table),
    quote_ident(column)
  )
}

/// Column names in declaration order.
pub const TABLE_COLUMNS_SQL: &str =
  "SELECT name FROM pragma_table_info(?1) ORDER BY cid";

#[cfg(test)]
mod tests {
  use strata_core::sanitize::is_identifier;

  use super::*;

  #[test]
  fn index_name_is_never_a_table_name() {
    assert_eq!(origin_index_name("boat_data"), "boat_data:origin_idx");
    assert!(!is_identifier(&origin_index_name("a")));
  }
}
