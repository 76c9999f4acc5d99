//! Upgrade operation: bring already materialized records up to a selection.

use std::collections::HashMap;

use loadout_schema::{GroupKey, Record, Row, Value, distinct_keys};
use tracing::debug;

use crate::assemble::{assemble, can_upgrade};
use crate::association::{log_query, validate_joins};
use crate::backend::Backend;
use crate::collection::Params;
use crate::datasource::Datasource;
use crate::error::{QueryError, QueryResult};
use crate::resolver::ResolvedSelection;
use crate::scope::Scope;
use crate::selection::SelectionNode;

/// Materializes a selection on records the caller already holds.
///
/// When every requested column is present and every requested association is
/// already loaded at every depth, the records are completed in place and only
/// batch-loaded and nested datasource values are computed. Otherwise the
/// records are fetched again by identity. Both paths assemble the same rows.
pub struct UpgradeOperation<'a, B: Backend> {
    datasource: &'a Datasource<B>,
    records: Vec<Record>,
    selection: SelectionNode,
    params: Params,
}

impl<'a, B: Backend> UpgradeOperation<'a, B> {
    /// Create a new upgrade operation.
    pub fn new(datasource: &'a Datasource<B>, records: Vec<Record>) -> Self {
        Self {
            datasource,
            records,
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

    fn resolve(&self) -> QueryResult<Option<ResolvedSelection>> {
        let Some(first) = self.records.first() else {
            return Ok(None);
        };
        let entity = first.entity();
        if let Some(other) = self.records.iter().find(|r| r.entity() != entity) {
            return Err(QueryError::invalid_selection(format!(
                "cannot upgrade a mix of `{}` and `{}` records",
                entity,
                other.entity()
            ))
            .with_context("Upgrading records"));
        }

        let schema = self.datasource.registry().get_schema(entity)?;
        let selection = self.datasource.resolver().normalize(&schema, &self.selection)?;
        Ok(Some(selection))
    }

    /// Check if the records can be completed without a refetch.
    pub fn can_upgrade(&self) -> QueryResult<bool> {
        Ok(match self.resolve()? {
            Some(selection) => can_upgrade(&self.datasource.resolver(), &selection, &self.records),
            None => true,
        })
    }

    /// Upgrade and return the materialized records.
    pub async fn records(self) -> QueryResult<Vec<Record>> {
        let (_, records) = self.run().await?;
        Ok(records)
    }

    /// Upgrade and assemble the output rows.
    pub async fn exec(self) -> QueryResult<Vec<Row>> {
        match self.run().await? {
            (Some(selection), records) => Ok(assemble(&selection, &records)),
            (None, _) => Ok(Vec::new()),
        }
    }

    async fn run(self) -> QueryResult<(Option<ResolvedSelection>, Vec<Record>)> {
        let Some(selection) = self.resolve()? else {
            return Ok((None, Vec::new()));
        };
        let datasource = self.datasource;
        let resolver = datasource.resolver();
        let loader = datasource.association_loader(&self.params);
        let mut records = self.records;

        if can_upgrade(&resolver, &selection, &records) {
            debug!(
                entity = selection.entity(),
                records = records.len(),
                "Upgrading records in place"
            );
            loader
                .reuse_loaded(true)
                .materialize(&mut records, &selection, Vec::new())
                .await?;
            return Ok((Some(selection), records));
        }

        let backend = datasource.backend();
        let primary_key = selection.schema.primary_key();
        let ids = distinct_keys(records.iter().map(|r| backend.record_identity(r, primary_key)));

        let mut plan = resolver.plan(&selection);
        plan.require_column(primary_key);
        let scope = Scope::for_schema(&selection.schema).where_in(primary_key, ids);
        validate_joins(backend, &scope, &plan)?;
        log_query(backend, datasource.config(), &scope, &plan);
        debug!(
            entity = selection.entity(),
            records = records.len(),
            "Re-fetching records for upgrade"
        );

        let mut fetched = backend.fetch_rows(&scope, plan.columns()).await?;
        loader
            .materialize(&mut fetched, &selection, Vec::new())
            .await?;

        let mut by_identity: HashMap<GroupKey, Record> = HashMap::with_capacity(fetched.len());
        for record in fetched {
            let key = backend.record_identity(&record, primary_key).group_key();
            if let Some(key) = key {
                by_identity.insert(key, record);
            }
        }
        let upgraded = records
            .iter()
            .filter_map(|r| backend.record_identity(r, primary_key).group_key())
            .filter_map(|key| by_identity.get(&key).cloned())
            .collect();
        Ok((Some(selection), upgraded))
    }
}
