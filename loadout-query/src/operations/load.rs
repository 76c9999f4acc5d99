//! Load operation: fetch a scope and materialize a selection on it.

use loadout_schema::{Record, Row, Value};
use tracing::debug;

use crate::assemble::assemble;
use crate::association::{log_query, validate_joins};
use crate::backend::Backend;
use crate::collection::Params;
use crate::datasource::Datasource;
use crate::error::QueryResult;
use crate::plan::FetchPlan;
use crate::resolver::ResolvedSelection;
use crate::scope::Scope;
use crate::selection::SelectionNode;

/// Loads the records of a scope with exactly the requested shape.
///
/// # Example
///
/// ```rust,ignore
/// let rows = datasource
///     .load(datasource.scope("Post")?.where_in("id", [1, 2]))
///     .select(SelectionNode::from_json(&json!(["id", {"comments": ["comment"]}]))?)
///     .param("locale", "en")
///     .exec()
///     .await?;
/// ```
pub struct LoadOperation<'a, B: Backend> {
    datasource: &'a Datasource<B>,
    scope: Scope,
    selection: SelectionNode,
    params: Params,
}

impl<'a, B: Backend> LoadOperation<'a, B> {
    /// Create a new load operation.
    pub fn new(datasource: &'a Datasource<B>, scope: Scope) -> Self {
        Self {
            datasource,
            scope,
            selection: SelectionNode::new(),
            params: Params::new(),
        }
    }

    /// Request a shape. Repeated calls merge.
    pub fn select(mut self, selection: SelectionNode) -> Self {
        self.selection.merge(selection);
        self
    }

    /// Set a request parameter visible to every batch loader.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Set several request parameters.
    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    fn prepare(&self) -> QueryResult<(ResolvedSelection, FetchPlan)> {
        let schema = self.datasource.registry().get_schema(&self.scope.entity)?;
        let resolver = self.datasource.resolver();
        let selection = resolver.normalize(&schema, &self.selection)?;
        let plan = resolver.plan(&selection);
        Ok((selection, plan))
    }

    /// Render the base query without running it.
    pub fn to_query(&self) -> QueryResult<String> {
        let (_, plan) = self.prepare()?;
        Ok(self
            .datasource
            .backend()
            .render_query_text(&self.scope, plan.columns()))
    }

    /// Fetch and materialize the records without assembling output rows.
    pub async fn records(self) -> QueryResult<Vec<Record>> {
        let (_, records) = self.run().await?;
        Ok(records)
    }

    /// Execute the load.
    pub async fn exec(self) -> QueryResult<Vec<Row>> {
        let (selection, records) = self.run().await?;
        Ok(assemble(&selection, &records))
    }

    async fn run(self) -> QueryResult<(ResolvedSelection, Vec<Record>)> {
        let (selection, plan) = self.prepare()?;
        let datasource = self.datasource;
        let backend = datasource.backend();

        validate_joins(backend, &self.scope, &plan)?;
        log_query(backend, datasource.config(), &self.scope, &plan);
        debug!(
            entity = selection.entity(),
            columns = ?plan.column_names().collect::<Vec<_>>(),
            "Fetching base rows"
        );

        let mut records = backend.fetch_rows(&self.scope, plan.columns()).await?;
        datasource
            .association_loader(&self.params)
            .materialize(&mut records, &selection, Vec::new())
            .await?;
        Ok((selection, records))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use loadout_schema::{BatchOptions, LoadoutConfig, SchemaRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::backend::testing::StubBackend;
    use crate::loaded::LoaderOutput;

    fn datasource() -> Datasource<StubBackend> {
        let registry = SchemaRegistry::new();
        registry
            .register_with("Post", |s| {
                s.column("title")
                    .query_with_join("blog_name", "blogs.name", "blogs")
                    .loaded("viewer_locale", BatchOptions::keyed())
                    .has_many("comments", "Comment", "post_id")
            })
            .unwrap();
        registry
            .register_with("Comment", |s| s.columns(["post_id", "comment"]))
            .unwrap();

        let backend = StubBackend::default()
            .with_table(
                "posts",
                vec![
                    Record::new("Post").with("id", 1).with("title", "one"),
                    Record::new("Post").with("id", 2).with("title", "two"),
                ],
            )
            .with_table(
                "comments",
                vec![Record::new("Comment").with("id", 10).with("post_id", 2).with("comment", "hi")],
            );

        let mut ds = Datasource::new(Arc::new(backend), Arc::new(registry));
        ds.register_fn("Post", "load_viewer_locale", |ctx| {
            let locale = ctx.param("locale").cloned().unwrap_or_default();
            Ok(LoaderOutput::pairs(
                ctx.ids().iter().map(|id| (id.clone(), locale.clone())),
            ))
        });
        ds
    }

    #[tokio::test]
    async fn test_exec_prunes_to_selection() {
        let ds = datasource();
        let rows = ds
            .load(ds.scope("Post").unwrap())
            .select(SelectionNode::from_json(&json!(["title", {"comments": ["comment"]}])).unwrap())
            .exec()
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!([
                {"title": "one", "comments": []},
                {"title": "two", "comments": [{"comment": "hi"}]}
            ])
        );
        assert_eq!(ds.backend().fetches.load(Ordering::SeqCst), 1);
        assert_eq!(ds.backend().preloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_params_reach_loaders() {
        let ds = datasource();
        let rows = ds
            .load(ds.scope("Post").unwrap().where_in("id", [2]))
            .select(SelectionNode::new().fields(["id", "viewer_locale"]))
            .param("locale", "de")
            .exec()
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!([{"id": 2, "viewer_locale": "de"}])
        );
    }

    #[tokio::test]
    async fn test_missing_join_fails_before_fetch() {
        let ds = datasource();
        let err = ds
            .load(ds.scope("Post").unwrap())
            .select(SelectionNode::new().field("blog_name"))
            .exec()
            .await
            .unwrap_err();
        assert!(err.is_missing_join());
        assert_eq!(ds.backend().fetches.load(Ordering::SeqCst), 0);

        let joined = ds.scope("Post").unwrap().join("JOIN blogs ON blogs.id = posts.blog_id");
        assert!(
            ds.load(joined)
                .select(SelectionNode::new().field("blog_name"))
                .exec()
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_unknown_names() {
        let ds = datasource().with_config(LoadoutConfig::strict());
        let err = ds
            .load(ds.scope("Post").unwrap())
            .select(SelectionNode::new().fields(["id", "ghost_field"]))
            .records()
            .await
            .unwrap_err();
        assert!(err.is_unknown_attribute());
    }

    #[test]
    fn test_to_query() {
        let ds = datasource();
        let text = ds
            .load(ds.scope("Post").unwrap())
            .select(SelectionNode::new().fields(["title", "comments"]))
            .to_query()
            .unwrap();
        assert_eq!(text, "SELECT title, id FROM posts");
    }
}
