//! Stored rows and the batches appended during ingestion.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::schema::ID_COLUMN;

/// A stored row: its identity plus every other column in schema order.
///
/// Serialises as one flat object, `id` first:
/// `{"id": 1, "origin_file": "a.csv", "speed": "12"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
  pub id:     i64,
  pub values: Vec<(String, Option<String>)>,
}

impl Row {
  /// Value of `column`; `None` if the column is absent or the cell is null.
  pub fn get(&self, column: &str) -> Option<&str> {
    self
      .values
      .iter()
      .find(|(c, _)| c == column)
      .and_then(|(_, v)| v.as_deref())
  }
}

impl Serialize for Row {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
    map.serialize_entry(ID_COLUMN, &self.id)?;
    for (column, value) in &self.values {
      map.serialize_entry(column, value)?;
    }
    map.end()
  }
}

/// Rows ready to append, all sharing one column list.
///
/// `columns` already includes `origin_file`; every entry in `rows` has
/// exactly `columns.len()` cells.
#[derive(Debug, Clone, Default)]
pub struct RowBatch {
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<Option<String>>>,
}

impl RowBatch {
  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn serialises_flat_with_id_first() {
    let row = Row {
      id:     1,
      values: vec![
        ("origin_file".into(), Some("a.csv".into())),
        ("speed".into(), Some("12".into())),
        ("depth".into(), None),
      ],
    };
    let json = serde_json::to_string(&row).unwrap();
    assert_eq!(
      json,
      r#"{"id":1,"origin_file":"a.csv","speed":"12","depth":null}"#
    );
  }

  #[test]
  fn get_treats_null_as_absent() {
    let row = Row {
      id:     7,
      values: vec![("depth".into(), None), ("speed".into(), Some("3".into()))],
    };
    assert_eq!(row.get("speed"), Some("3"));
    assert_eq!(row.get("depth"), None);
    assert_eq!(row.get("missing"), None);
  }
}
