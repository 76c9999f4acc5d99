//! Base scopes: which rows of an entity a load starts from.

use std::fmt;
use std::sync::LazyLock;

use loadout_schema::{SchemaDefinition, Value};
use smol_str::SmolStr;

static JOIN_TABLE: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"(?i)\bjoin\s+(\w+)").expect("static pattern is valid")
});

/// Sort order for scope ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A row condition of a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`.
    Equals {
        /// Column name.
        column: String,
        /// Compared value.
        value: Value,
    },
    /// `column IN (values)`.
    In {
        /// Column name.
        column: String,
        /// Accepted values.
        values: Vec<Value>,
    },
}

impl Condition {
    /// Column the condition tests.
    pub fn column(&self) -> &str {
        match self {
            Self::Equals { column, .. } | Self::In { column, .. } => column,
        }
    }

    /// Check if a value satisfies the condition.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Equals { value: expected, .. } => !value.is_null() && value == expected,
            Self::In { values, .. } => !value.is_null() && values.contains(value),
        }
    }
}

/// The base scope of a load: entity, table, joins, conditions, ordering and limit.
///
/// Joins are kept as backend-native clauses; the engine only inspects them to
/// check that query expressions find the tables they read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    /// Entity type loaded.
    pub entity: SmolStr,
    /// Backing table.
    pub table: String,
    /// Join clauses, e.g. `JOIN blogs ON blogs.id = posts.blog_id`.
    pub joins: Vec<String>,
    /// Conditions, all of which must hold.
    pub conditions: Vec<Condition>,
    /// Ordering.
    pub order_by: Vec<(String, SortOrder)>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl Scope {
    /// Create a scope over `table` for `entity`.
    pub fn new(entity: impl Into<SmolStr>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Create a scope over every row of a schema's table.
    pub fn for_schema(schema: &SchemaDefinition) -> Self {
        Self::new(schema.entity(), schema.table())
    }

    /// Add a join clause.
    pub fn join(mut self, clause: impl Into<String>) -> Self {
        self.joins.push(clause.into());
        self
    }

    /// Require `column = value`.
    pub fn r#where(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Equals {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Require `column IN (values)`.
    pub fn where_in(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        self.conditions.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Order by a column.
    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    /// Limit the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if the scope joins `table`, either through a `JOIN <table>` clause
    /// or a join entry naming the table alone.
    pub fn joins_table(&self, table: &str) -> bool {
        self.joins.iter().any(|clause| {
            clause.trim() == table
                || JOIN_TABLE
                    .captures_iter(clause)
                    .any(|caps| caps[1].eq_ignore_ascii_case(table))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let scope = Scope::new("Post", "posts")
            .r#where("published", true)
            .where_in("id", [1, 2, 3])
            .order_by("id", SortOrder::Desc)
            .limit(10);

        assert_eq!(scope.conditions.len(), 2);
        assert_eq!(scope.conditions[1].column(), "id");
        assert_eq!(scope.order_by, vec![("id".to_string(), SortOrder::Desc)]);
        assert_eq!(scope.limit, Some(10));
    }

    #[test]
    fn test_joins_table() {
        let scope = Scope::new("Post", "posts")
            .join("LEFT OUTER JOIN blogs ON blogs.id = posts.blog_id")
            .join("users");

        assert!(scope.joins_table("blogs"));
        assert!(scope.joins_table("users"));
        assert!(!scope.joins_table("blog"));
        assert!(!scope.joins_table("comments"));
    }

    #[test]
    fn test_condition_never_matches_null() {
        let eq = Condition::Equals {
            column: "post_id".into(),
            value: Value::Null,
        };
        assert!(!eq.matches(&Value::Null));

        let within = Condition::In {
            column: "id".into(),
            values: vec![Value::Int(1), Value::Int(2)],
        };
        assert!(within.matches(&Value::Int(2)));
        assert!(!within.matches(&Value::Int(3)));
    }
}
