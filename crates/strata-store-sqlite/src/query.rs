//! SQL text for row reads and writes.
//!
//! Identifiers reaching this module come from a validated
//! [`Filter`](strata_core::filter::Filter) or from the live schema, and are
//! quoted regardless. Values are always returned separately as parameters.

use strata_core::{filter::Filter, schema::ID_COLUMN};

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

/// `SELECT * ... WHERE c1 = ?1 AND c2 = ?2 ORDER BY id` and its parameters.
pub fn select_sql(table: &str, filter: &Filter) -> (String, Vec<String>) {
  let mut sql = format!("SELECT * FROM {}", quote_ident(table));
  let mut params = Vec::with_capacity(filter.terms().len());

  if !filter.is_empty() {
    let conds: Vec<String> = filter
      .terms()
      .iter()
      .enumerate()
      .map(|(i, (column, _))| format!("{} = ?{}", quote_ident(column), i + 1))
      .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&conds.join(" AND "));
    params.extend(filter.terms().iter().map(|(_, value)| value.clone()));
  }

  sql.push_str(&format!(" ORDER BY {}", quote_ident(ID_COLUMN)));
  (sql, params)
}

pub fn insert_sql(table: &str, columns: &[String]) -> String {
  let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
  let slots: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    quote_ident(table),
    names.join(", "),
    slots.join(", ")
  )
}
