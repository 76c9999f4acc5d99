//! In-memory backend implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use loadout_query::{Backend, Projection, QueryResult, Scope};
use loadout_schema::{
    AssociationDescriptor, Cardinality, GroupKey, LoadedAssociation, Record, Row,
    SchemaDefinition, Value, distinct_keys,
};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{MemoryError, MemoryResult};
use crate::sql::render_select;
use crate::table::{Table, read};

/// Evaluates a query expression against one stored row.
pub type ExpressionFn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// A backend keeping every table in memory.
///
/// Every call is counted and its rendered query text logged, so tests can
/// assert on the number of backend round trips.
///
/// # Example
///
/// ```rust
/// use loadout_memory::MemoryBackend;
/// use serde_json::json;
///
/// let backend = MemoryBackend::new();
/// backend.insert_json("posts", json!([{"id": 1, "title": "Hello"}])).unwrap();
/// assert_eq!(backend.row_count("posts"), 1);
/// ```
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    expressions: RwLock<HashMap<String, ExpressionFn>>,
    fetch_count: AtomicUsize,
    preload_count: AtomicUsize,
    preloads_by_association: Mutex<HashMap<String, usize>>,
    query_log: Mutex<Vec<String>>,
    fail_next: Mutex<Option<String>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with known columns, replacing any existing one.
    pub fn create_table(
        &self,
        table: &str,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.tables
            .write()
            .insert(table.to_string(), Table::with_columns(table, columns));
    }

    /// Append a row, creating the table when needed.
    pub fn insert(&self, table: &str, row: Row) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_insert_with(|| Table::new(table))
            .insert(row);
    }

    /// Append a JSON object, or every object of a JSON array.
    pub fn insert_json(&self, table: &str, rows: serde_json::Value) -> MemoryResult<()> {
        let mut tables = self.tables.write();
        let target = tables
            .entry(table.to_string())
            .or_insert_with(|| Table::new(table));
        match rows {
            serde_json::Value::Array(rows) => rows.into_iter().try_for_each(|r| target.insert_json(r)),
            row => target.insert_json(row),
        }
    }

    /// Register the evaluator of a query expression.
    ///
    /// Projections of `sql` evaluate `f` against each stored row.
    pub fn register_expression<F>(&self, sql: impl Into<String>, f: F)
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.expressions.write().insert(sql.into(), Arc::new(f));
    }

    /// Make the next fetch or preload fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    /// Snapshot of the rows stored in a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows().to_vec())
            .unwrap_or_default()
    }

    /// Number of rows stored in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Table::len)
    }

    /// Number of `fetch_rows` calls.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of `preload_association` calls.
    pub fn preload_count(&self) -> usize {
        self.preload_count.load(Ordering::SeqCst)
    }

    /// Number of `preload_association` calls for one association name.
    pub fn preload_count_for(&self, association: &str) -> usize {
        self.preloads_by_association
            .lock()
            .get(association)
            .copied()
            .unwrap_or(0)
    }

    /// Rendered text of every query run, in order.
    pub fn queries(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    /// Reset the counters and the query log.
    pub fn reset_counters(&self) {
        self.fetch_count.store(0, Ordering::SeqCst);
        self.preload_count.store(0, Ordering::SeqCst);
        self.preloads_by_association.lock().clear();
        self.query_log.lock().clear();
    }

    fn take_failure(&self) -> MemoryResult<()> {
        match self.fail_next.lock().take() {
            Some(message) => Err(MemoryError::Injected(message)),
            None => Ok(()),
        }
    }

    fn log(&self, scope: &Scope, columns: &[Projection]) {
        let text = render_select(scope, columns);
        debug!(query = %text, "memory backend query");
        self.query_log.lock().push(text);
    }

    /// Run a scope and project the matching rows.
    fn select(&self, scope: &Scope, columns: &[Projection]) -> MemoryResult<Vec<(Row, Row)>> {
        let tables = self.tables.read();
        let table = tables
            .get(&scope.table)
            .ok_or_else(|| MemoryError::UnknownTable(scope.table.clone()))?;
        let expressions = self.expressions.read();

        for projection in columns {
            match projection {
                Projection::Column(name) => table.check_column(name)?,
                Projection::Expression { sql, .. } => {
                    if !expressions.contains_key(sql) {
                        return Err(MemoryError::UnknownExpression(sql.clone()));
                    }
                }
            }
        }

        let rows = table.select(scope)?;
        Ok(rows
            .into_iter()
            .map(|stored| {
                let mut projected = Row::with_capacity(columns.len());
                for projection in columns {
                    let value = match projection {
                        Projection::Column(name) => read(stored, name).clone(),
                        Projection::Expression { sql, .. } => expressions
                            .get(sql)
                            .map(|f| f(stored))
                            .unwrap_or_default(),
                    };
                    projected.insert(projection.name().to_string(), value);
                }
                (stored.clone(), projected)
            })
            .collect())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_rows(&self, scope: &Scope, columns: &[Projection]) -> QueryResult<Vec<Record>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        self.log(scope, columns);

        let rows = self.select(scope, columns)?;
        Ok(rows
            .into_iter()
            .map(|(_, projected)| Record::from_row(scope.entity.clone(), projected))
            .collect())
    }

    async fn preload_association(
        &self,
        records: &mut [Record],
        association: &AssociationDescriptor,
        target: &SchemaDefinition,
        columns: &[Projection],
    ) -> QueryResult<()> {
        self.preload_count.fetch_add(1, Ordering::SeqCst);
        *self
            .preloads_by_association
            .lock()
            .entry(association.name.clone())
            .or_default() += 1;
        self.take_failure()?;

        let local = association.join_key.local.as_str();
        let remote = association.join_key.remote.as_str();
        let keys = distinct_keys(records.iter().filter_map(|r| r.get(local)));

        let mut related: HashMap<GroupKey, Vec<Record>> = HashMap::new();
        if !keys.is_empty() {
            let scope = Scope::for_schema(target).where_in(remote, keys);
            self.log(&scope, columns);
            for (stored, projected) in self.select(&scope, columns)? {
                if let Some(key) = read(&stored, remote).group_key() {
                    related
                        .entry(key)
                        .or_default()
                        .push(Record::from_row(target.entity(), projected));
                }
            }
        }

        for record in records.iter_mut() {
            let matches = record
                .get(local)
                .and_then(Value::group_key)
                .and_then(|key| related.get(&key))
                .cloned()
                .unwrap_or_default();
            let loaded = match association.cardinality {
                Cardinality::Many => LoadedAssociation::Many(matches),
                Cardinality::One => LoadedAssociation::One(matches.into_iter().next().map(Box::new)),
            };
            record.set_association(association.name.as_str(), loaded);
        }
        Ok(())
    }

    fn render_query_text(&self, scope: &Scope, columns: &[Projection]) -> String {
        render_select(scope, columns)
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tables: Vec<String> = self.tables.read().keys().cloned().collect();
        tables.sort();
        f.debug_struct("MemoryBackend")
            .field("tables", &tables)
            .field("fetch_count", &self.fetch_count())
            .field("preload_count", &self.preload_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .insert_json(
                "posts",
                json!([
                    {"id": 1, "title": "one", "blog_id": 7},
                    {"id": 2, "title": "two", "blog_id": 7},
                    {"id": 3, "title": "three", "blog_id": null}
                ]),
            )
            .unwrap();
        backend
            .insert_json(
                "comments",
                json!([
                    {"id": 10, "post_id": 1, "comment": "c1"},
                    {"id": 11, "post_id": 1, "comment": "c2"},
                    {"id": 12, "post_id": 2, "comment": "c3"}
                ]),
            )
            .unwrap();
        backend
    }

    fn comment_schema() -> SchemaDefinition {
        SchemaDefinition::builder("Comment")
            .columns(["post_id", "comment"])
            .build()
            .unwrap()
    }

    fn post_records() -> Vec<Record> {
        vec![
            Record::new("Post").with("id", 1),
            Record::new("Post").with("id", 3),
            Record::new("Post").with("id", 2),
        ]
    }

    #[tokio::test]
    async fn test_fetch_projects_and_logs() {
        let backend = backend();
        backend.register_expression("upper(title)", |row: &Row| {
            Value::from(read(row, "title").as_str().unwrap_or_default().to_uppercase())
        });
        let scope = Scope::new("Post", "posts").r#where("id", 2);
        let columns = vec![
            Projection::Column("id".into()),
            Projection::Expression {
                alias: "shout".into(),
                sql: "upper(title)".into(),
            },
        ];

        let records = backend.fetch_rows(&scope, &columns).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity(), "Post");
        assert_eq!(records[0].get("shout"), Some(&Value::from("TWO")));
        assert!(!records[0].has_column("title"));
        assert_eq!(backend.fetch_count(), 1);
        assert_eq!(
            backend.queries(),
            vec!["SELECT posts.id, (upper(title)) AS shout FROM posts WHERE posts.id = 2"]
        );
    }

    #[tokio::test]
    async fn test_unknown_table_column_and_expression() {
        let backend = backend();
        let id = vec![Projection::Column("id".into())];

        let err = backend
            .fetch_rows(&Scope::new("Ghost", "ghosts"), &id)
            .await
            .unwrap_err();
        assert!(err.is_backend());

        let err = backend
            .fetch_rows(
                &Scope::new("Post", "posts"),
                &[Projection::Column("body".into())],
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("posts.body"));

        let err = backend
            .fetch_rows(
                &Scope::new("Post", "posts"),
                &[Projection::Expression {
                    alias: "x".into(),
                    sql: "now()".into(),
                }],
            )
            .await
            .unwrap_err();
        assert!(err.is_backend());
    }

    #[tokio::test]
    async fn test_preload_many_in_one_round_trip() {
        let backend = backend();
        let target = comment_schema();
        let association = AssociationDescriptor::has_many("comments", "Comment", "id", "post_id");
        let columns = vec![
            Projection::Column("comment".into()),
            Projection::Column("post_id".into()),
        ];

        let mut records = post_records();
        backend
            .preload_association(&mut records, &association, &target, &columns)
            .await
            .unwrap();

        assert_eq!(backend.preload_count(), 1);
        assert_eq!(backend.preload_count_for("comments"), 1);
        assert_eq!(backend.fetch_count(), 0);
        assert_eq!(records[0].association("comments").unwrap().len(), 2);
        assert!(records[1].association("comments").unwrap().is_empty());
        assert_eq!(records[2].association("comments").unwrap().len(), 1);
        assert_eq!(
            backend.queries(),
            vec!["SELECT comments.comment, comments.post_id FROM comments WHERE comments.post_id IN (1, 3, 2)"]
        );
    }

    #[tokio::test]
    async fn test_preload_one_takes_first_match() {
        let backend = backend();
        let target = comment_schema();
        let association = AssociationDescriptor::has_one("first_comment", "Comment", "id", "post_id");
        let columns = vec![Projection::Column("comment".into())];

        let mut records = post_records();
        backend
            .preload_association(&mut records, &association, &target, &columns)
            .await
            .unwrap();

        let Some(LoadedAssociation::One(Some(first))) = records[0].association("first_comment")
        else {
            panic!("expected a loaded comment");
        };
        assert_eq!(first.get("comment"), Some(&Value::from("c1")));
        assert_eq!(
            records[1].association("first_comment"),
            Some(&LoadedAssociation::One(None))
        );
    }

    #[tokio::test]
    async fn test_injected_failure_passes_through_once() {
        let backend = backend();
        backend.fail_next("connection reset");
        let id = vec![Projection::Column("id".into())];

        let err = backend
            .fetch_rows(&Scope::new("Post", "posts"), &id)
            .await
            .unwrap_err();
        assert!(err.is_backend());
        assert!(err.message.contains("connection reset"));

        assert!(backend.fetch_rows(&Scope::new("Post", "posts"), &id).await.is_ok());
        backend.reset_counters();
        assert_eq!(backend.fetch_count(), 0);
        assert!(backend.queries().is_empty());
    }

    #[test]
    fn test_create_table_declares_columns() {
        let backend = MemoryBackend::new();
        backend.create_table("tags", ["id", "name"]);
        assert_eq!(backend.row_count("tags"), 0);
        assert_eq!(
            backend.render_query_text(&Scope::new("Tag", "tags").limit(1), &[]),
            "SELECT * FROM tags LIMIT 1"
        );
    }
}
