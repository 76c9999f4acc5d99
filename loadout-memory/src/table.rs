//! Row storage for one table.

use indexmap::IndexSet;
use loadout_query::{Condition, Scope, SortOrder};
use loadout_schema::{Row, Value};

use crate::error::{MemoryError, MemoryResult};

/// Rows of one table in insertion order.
///
/// The known columns are the union of the keys of every inserted row. A row
/// missing a known column reads it as `NULL`.
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    columns: IndexSet<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an empty table with known columns.
    pub fn with_columns(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a row.
    pub fn insert(&mut self, row: Row) {
        self.columns.extend(row.keys().cloned());
        self.rows.push(row);
    }

    /// Append a row given as a JSON object.
    pub fn insert_json(&mut self, row: serde_json::Value) -> MemoryResult<()> {
        match Value::from(row) {
            Value::Object(row) => {
                self.insert(row);
                Ok(())
            }
            other => Err(MemoryError::InvalidRow {
                table: self.name.clone(),
                message: format!("expected an object, found `{}`", other),
            }),
        }
    }

    /// Check if a column is known.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Known columns in first-seen order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// All rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows matching the scope's conditions, ordered and limited.
    pub fn select(&self, scope: &Scope) -> MemoryResult<Vec<&Row>> {
        for condition in &scope.conditions {
            self.check_column(condition.column())?;
        }
        for (column, _) in &scope.order_by {
            self.check_column(column)?;
        }

        let mut rows: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| scope.conditions.iter().all(|c| matches(c, row)))
            .collect();

        if !scope.order_by.is_empty() {
            rows.sort_by(|a, b| {
                scope
                    .order_by
                    .iter()
                    .map(|(column, order)| {
                        let ordering = read(a, column).sort_cmp(read(b, column));
                        match order {
                            SortOrder::Asc => ordering,
                            SortOrder::Desc => ordering.reverse(),
                        }
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        if let Some(limit) = scope.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    /// Fail unless the column is known.
    pub fn check_column(&self, column: &str) -> MemoryResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(MemoryError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
        }
    }
}

/// Read a column, `NULL` when the row lacks it.
pub fn read<'r>(row: &'r Row, column: &str) -> &'r Value {
    static NULL: Value = Value::Null;
    row.get(column).unwrap_or(&NULL)
}

fn matches(condition: &Condition, row: &Row) -> bool {
    condition.matches(read(row, condition.column()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn comments() -> Table {
        let mut table = Table::new("comments");
        for (id, post_id, text) in [(1, 1, "c1"), (2, 1, "c2"), (3, 2, "x")] {
            table
                .insert_json(json!({"id": id, "post_id": post_id, "comment": text}))
                .unwrap();
        }
        table
            .insert_json(json!({"id": 4, "comment": "orphan"}))
            .unwrap();
        table
    }

    fn ids(rows: &[&Row]) -> Vec<i64> {
        rows.iter().filter_map(|r| read(r, "id").as_int()).collect()
    }

    #[test]
    fn test_filter_order_limit() {
        let table = comments();
        let scope = Scope::new("Comment", "comments")
            .where_in("post_id", [1, 2])
            .order_by("id", SortOrder::Desc)
            .limit(2);
        assert_eq!(ids(&table.select(&scope).unwrap()), vec![3, 2]);

        let scope = Scope::new("Comment", "comments").r#where("post_id", 1);
        assert_eq!(ids(&table.select(&scope).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_missing_value_reads_null_and_never_matches() {
        let table = comments();
        assert_eq!(read(&table.rows()[3], "post_id"), &Value::Null);

        let scope = Scope::new("Comment", "comments").where_in("post_id", [Value::Null]);
        assert!(table.select(&scope).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let table = comments();
        let err = table
            .select(&Scope::new("Comment", "comments").r#where("body", "x"))
            .unwrap_err();
        assert_eq!(
            err,
            MemoryError::UnknownColumn {
                table: "comments".into(),
                column: "body".into()
            }
        );
    }

    #[test]
    fn test_insert_json_requires_object() {
        let mut table = Table::new("posts");
        assert!(table.insert_json(json!([1, 2])).is_err());
        assert!(table.is_empty());
    }
}
