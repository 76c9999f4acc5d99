//! Collection context handed to batch loaders.

use std::fmt;
use std::sync::OnceLock;

use loadout_schema::{Record, Row, SchemaDefinition, Value, distinct_keys};

/// Request parameters passed through to every batch loader.
pub type Params = Row;

/// The whole record collection a batch-loaded attribute is computed for.
///
/// Created once per batch-loaded attribute per level and dropped as soon as
/// that attribute's values are computed.
pub struct CollectionContext<'a, B: ?Sized> {
    records: &'a [Record],
    schema: &'a SchemaDefinition,
    backend: &'a B,
    params: &'a Params,
    ids: OnceLock<Vec<Value>>,
}

impl<'a, B: ?Sized> CollectionContext<'a, B> {
    /// Create a context over `records`.
    pub fn new(
        records: &'a [Record],
        schema: &'a SchemaDefinition,
        backend: &'a B,
        params: &'a Params,
    ) -> Self {
        Self {
            records,
            schema,
            backend,
            params,
            ids: OnceLock::new(),
        }
    }

    /// Records of the collection in fetch order.
    pub fn records(&self) -> &'a [Record] {
        self.records
    }

    /// Identity values of the records, in record order.
    ///
    /// Repeats and values without a group key are skipped. Computed on first use.
    pub fn ids(&self) -> &[Value] {
        self.ids.get_or_init(|| {
            let primary_key = self.schema.primary_key();
            distinct_keys(self.records.iter().map(|r| r.identity(primary_key)))
        })
    }

    /// Values of a fetched column across the collection, in record order.
    pub fn column_values(&self, column: &str) -> Vec<Value> {
        self.records
            .iter()
            .filter_map(|r| r.get(column))
            .filter(|v| !v.is_null())
            .cloned()
            .collect()
    }

    /// Schema of the records.
    pub fn schema(&self) -> &'a SchemaDefinition {
        self.schema
    }

    /// The backend the records came from.
    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// Request parameters.
    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// Get one request parameter.
    pub fn param(&self, name: &str) -> Option<&'a Value> {
        self.params.get(name)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<B: ?Sized> fmt::Debug for CollectionContext<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionContext")
            .field("entity", &self.schema.entity())
            .field("records", &self.records.len())
            .field("params", &self.params)
            .finish()
    }
}
