//! Fetch plans: the columns and joins a backend must provide.

use std::fmt;

/// One entry of a backend projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    /// A plain column of the scoped table.
    Column(String),
    /// A backend-native expression fetched under `alias`.
    Expression {
        /// Name the value is fetched as.
        alias: String,
        /// Expression text.
        sql: String,
    },
}

impl Projection {
    /// Name the fetched value is stored under.
    pub fn name(&self) -> &str {
        match self {
            Self::Column(name) => name,
            Self::Expression { alias, .. } => alias,
        }
    }

    /// Check if this is a plain column.
    pub fn is_column(&self) -> bool {
        matches!(self, Self::Column(_))
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => f.write_str(name),
            Self::Expression { alias, sql } => write!(f, "({}) AS {}", sql, alias),
        }
    }
}

/// A table a query expression reads from, and the attribute needing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequirement {
    /// Table that must be joined.
    pub table: String,
    /// Attribute requiring it.
    pub attribute: String,
}

/// Resolved output of the projection resolver.
///
/// Columns are deduplicated and kept in insertion order so generated
/// queries are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPlan {
    columns: Vec<Projection>,
    joins: Vec<JoinRequirement>,
}

impl FetchPlan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Projections in insertion order.
    pub fn columns(&self) -> &[Projection] {
        &self.columns
    }

    /// Names of the projections in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Projection::name)
    }

    /// Check if a value named `name` is fetched.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|p| p.name() == name)
    }

    /// Add a plain column unless already present.
    pub fn require_column(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.columns.push(Projection::Column(name));
        }
    }

    /// Add an expression unless its alias is already present.
    pub fn require_expression(&mut self, alias: impl Into<String>, sql: impl Into<String>) {
        let alias = alias.into();
        if !self.contains(&alias) {
            self.columns.push(Projection::Expression {
                alias,
                sql: sql.into(),
            });
        }
    }

    /// Record that `attribute` needs `table` joined.
    pub fn require_join(&mut self, table: impl Into<String>, attribute: impl Into<String>) {
        let requirement = JoinRequirement {
            table: table.into(),
            attribute: attribute.into(),
        };
        if !self.joins.contains(&requirement) {
            self.joins.push(requirement);
        }
    }

    /// Distinct tables that must be joined.
    pub fn joins_required(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for join in &self.joins {
            if !tables.contains(&join.table.as_str()) {
                tables.push(&join.table);
            }
        }
        tables
    }

    /// Join requirements with the attributes that caused them.
    pub fn join_requirements(&self) -> &[JoinRequirement] {
        &self.joins
    }

    /// Check if nothing needs fetching.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
