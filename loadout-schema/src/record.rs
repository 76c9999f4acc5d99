//! In-memory entity records as materialized by a backend.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::value::{Row, Value};

/// A materialized association on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedAssociation {
    /// Single related record (`belongs_to` / `has_one`), `None` when absent.
    One(Option<Box<Record>>),
    /// Related records in backend order.
    Many(Vec<Record>),
}

impl LoadedAssociation {
    /// Number of related records held.
    pub fn len(&self) -> usize {
        match self {
            Self::One(Some(_)) => 1,
            Self::One(None) => 0,
            Self::Many(records) => records.len(),
        }
    }

    /// Check if no related record is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the related records.
    pub fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self {
            Self::One(record) => Box::new(record.iter().map(|r| &**r)),
            Self::Many(records) => Box::new(records.iter()),
        }
    }
}

/// An entity instance: fetched columns, materialized associations and the
/// values computed for it by batch loaders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entity: SmolStr,
    columns: Row,
    associations: IndexMap<String, LoadedAssociation>,
    loaded: Row,
}

impl Record {
    /// Create an empty record of the given entity type.
    pub fn new(entity: impl Into<SmolStr>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Create a record from already fetched columns.
    pub fn from_row(entity: impl Into<SmolStr>, columns: Row) -> Self {
        Self {
            entity: entity.into(),
            columns,
            ..Default::default()
        }
    }

    /// Set a column value (builder style).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    /// Attach an association (builder style).
    pub fn with_association(mut self, name: impl Into<String>, assoc: LoadedAssociation) -> Self {
        self.associations.insert(name.into(), assoc);
        self
    }

    /// Entity type name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Fetched columns.
    pub fn columns(&self) -> &Row {
        &self.columns
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Set a column value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Check if a column was fetched.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// The identity value under the given primary key column, `Null` if absent.
    pub fn identity(&self, primary_key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.columns.get(primary_key).unwrap_or(&NULL)
    }

    /// Check if an association is materialized.
    pub fn is_association_loaded(&self, name: &str) -> bool {
        self.associations.contains_key(name)
    }

    /// Get a materialized association.
    pub fn association(&self, name: &str) -> Option<&LoadedAssociation> {
        self.associations.get(name)
    }

    /// Attach a materialized association, replacing any previous one.
    pub fn set_association(&mut self, name: impl Into<String>, assoc: LoadedAssociation) {
        self.associations.insert(name.into(), assoc);
    }

    /// Detach a materialized association.
    pub fn take_association(&mut self, name: &str) -> Option<LoadedAssociation> {
        self.associations.shift_remove(name)
    }

    /// Names of all materialized associations.
    pub fn association_names(&self) -> impl Iterator<Item = &str> {
        self.associations.keys().map(String::as_str)
    }

    /// Get a value computed by a batch loader or nested datasource.
    pub fn loaded_value(&self, name: &str) -> Option<&Value> {
        self.loaded.get(name)
    }

    /// Store a value computed by a batch loader or nested datasource.
    pub fn set_loaded(&mut self, name: impl Into<String>, value: Value) {
        self.loaded.insert(name.into(), value);
    }

    /// Convert the fetched columns into an object value, dropping
    /// associations and loaded values.
    pub fn into_value(self) -> Value {
        Value::Object(self.columns)
    }
}
