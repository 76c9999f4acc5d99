//! Backend capability interface.
//!
//! A backend issues queries and materializes records; the engine only decides
//! *what* to fetch. One implementation exists per storage backend.

use async_trait::async_trait;
use loadout_schema::{AssociationDescriptor, Record, SchemaDefinition, Value};

use crate::error::{QueryError, QueryResult};
use crate::plan::Projection;
use crate::scope::Scope;

/// Operations the engine requires from a storage backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    /// Fetch the rows of `scope`, projecting `columns`.
    ///
    /// Records come back in backend order, each holding exactly the projected
    /// names as columns.
    async fn fetch_rows(&self, scope: &Scope, columns: &[Projection]) -> QueryResult<Vec<Record>>;

    /// Batch-preload `association` for every record in one round trip.
    ///
    /// Related rows of `target` are fetched with `columns` and attached to each
    /// owner whose `join_key.local` value equals their `join_key.remote` value.
    /// Owners without a match get an empty association.
    async fn preload_association(
        &self,
        records: &mut [Record],
        association: &AssociationDescriptor,
        target: &SchemaDefinition,
        columns: &[Projection],
    ) -> QueryResult<()>;

    /// Backend-native query text for diagnostics.
    fn render_query_text(&self, scope: &Scope, columns: &[Projection]) -> String;

    /// Check if an association is already materialized on a record.
    fn is_association_loaded(&self, record: &Record, association: &str) -> bool {
        record.is_association_loaded(association)
    }

    /// Check that `scope` joins `table`, which `attribute` reads from.
    fn validate_join(&self, scope: &Scope, table: &str, attribute: &str) -> QueryResult<()> {
        if scope.joins_table(table) {
            Ok(())
        } else {
            Err(QueryError::missing_join(scope.entity.as_str(), attribute, table))
        }
    }

    /// Identity value of a record.
    fn record_identity<'r>(&self, record: &'r Record, primary_key: &str) -> &'r Value {
        record.identity(primary_key)
    }

    /// Value of a fetched column.
    fn record_get_column<'r>(&self, record: &'r Record, name: &str) -> Option<&'r Value> {
        record.get(name)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal backend over fixed records, for unit tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use loadout_schema::{Cardinality, LoadedAssociation};

    use super::*;
    use crate::scope::Condition;

    #[derive(Default)]
    pub struct StubBackend {
        pub tables: HashMap<String, Vec<Record>>,
        pub fetches: AtomicUsize,
        pub preloads: AtomicUsize,
    }

    impl StubBackend {
        pub fn with_table(mut self, table: &str, records: Vec<Record>) -> Self {
            self.tables.insert(table.to_string(), records);
            self
        }

        fn project(record: &Record, columns: &[Projection]) -> Record {
            let mut out = Record::new(record.entity());
            for column in columns {
                let value = record.get(column.name()).cloned().unwrap_or_default();
                out.set(column.name(), value);
            }
            out
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch_rows(&self, scope: &Scope, columns: &[Projection]) -> QueryResult<Vec<Record>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let rows = self
                .tables
                .get(&scope.table)
                .ok_or_else(|| QueryError::backend(format!("no such table `{}`", scope.table)))?;
            Ok(rows
                .iter()
                .filter(|r| {
                    scope.conditions.iter().all(|c: &Condition| {
                        c.matches(r.get(c.column()).unwrap_or(&Value::Null))
                    })
                })
                .map(|r| Self::project(r, columns))
                .collect())
        }

        async fn preload_association(
            &self,
            records: &mut [Record],
            association: &AssociationDescriptor,
            target: &SchemaDefinition,
            columns: &[Projection],
        ) -> QueryResult<()> {
            self.preloads.fetch_add(1, Ordering::SeqCst);
            let rows = self.tables.get(target.table()).cloned().unwrap_or_default();
            for record in records.iter_mut() {
                let key = record.get(&association.join_key.local).cloned().unwrap_or_default();
                let related: Vec<Record> = rows
                    .iter()
                    .filter(|r| !key.is_null() && r.get(&association.join_key.remote) == Some(&key))
                    .map(|r| Self::project(r, columns))
                    .collect();
                let loaded = match association.cardinality {
                    Cardinality::Many => LoadedAssociation::Many(related),
                    Cardinality::One => {
                        LoadedAssociation::One(related.into_iter().next().map(Box::new))
                    }
                };
                record.set_association(association.name.as_str(), loaded);
            }
            Ok(())
        }

        fn render_query_text(&self, scope: &Scope, columns: &[Projection]) -> String {
            let columns: Vec<_> = columns.iter().map(ToString::to_string).collect();
            format!("SELECT {} FROM {}", columns.join(", "), scope.table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubBackend;
    use super::*;

    #[test]
    fn test_default_validate_join() {
        let backend = StubBackend::default();
        let scope = Scope::new("Post", "posts").join("INNER JOIN blogs ON blogs.id = posts.blog_id");
        assert!(backend.validate_join(&scope, "blogs", "blog_name").is_ok());

        let err = backend
            .validate_join(&Scope::new("Post", "posts"), "blogs", "blog_name")
            .unwrap_err();
        assert!(err.is_missing_join());
        assert_eq!(err.context.field.as_deref(), Some("blog_name"));
    }

    #[test]
    fn test_default_record_accessors() {
        let backend = StubBackend::default();
        let record = Record::new("Post").with("id", 7).with("title", "hi");
        assert_eq!(backend.record_identity(&record, "id"), &Value::Int(7));
        assert_eq!(backend.record_get_column(&record, "title"), Some(&Value::from("hi")));
        assert!(!backend.is_association_loaded(&record, "comments"));
    }
}
