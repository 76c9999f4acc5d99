//! Recursive association loading.
//!
//! The loader walks a [`ResolvedSelection`] depth first. At every level it
//! preloads each requested association for the whole record batch in one
//! backend call, flattens the related records of all owners into a single
//! batch, recurses into that batch, and then hands the related records back
//! to their owners. Batch-loaded and nested datasource attributes are
//! computed once per level, after the associations of that level.

use std::collections::HashMap;

use futures::future::BoxFuture;
use loadout_schema::{
    AttributeImpl, BatchOptions, Cardinality, GroupKey, LoadedAssociation, LoadoutConfig,
    NestedDatasource, Record, SchemaDefinition, Value, distinct_keys,
};
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::assemble::assemble_row;
use crate::backend::Backend;
use crate::collection::{CollectionContext, Params};
use crate::error::{QueryError, QueryResult};
use crate::loaded::{LoadedValues, LoaderMap};
use crate::plan::FetchPlan;
use crate::resolver::{ProjectionResolver, ResolvedSelection};
use crate::scope::Scope;

/// Where the related records of one owner sit in the flattened batch.
enum Slot {
    One(bool),
    Many(usize),
    Missing,
}

/// Materializes associations and loaded attributes for a record batch.
pub struct AssociationLoader<'a, B: Backend + ?Sized> {
    backend: &'a B,
    resolver: ProjectionResolver<'a>,
    config: &'a LoadoutConfig,
    loaders: &'a LoaderMap<B>,
    params: &'a Params,
    reuse_loaded: bool,
}

impl<'a, B: Backend + ?Sized> AssociationLoader<'a, B> {
    /// Create a loader.
    pub fn new(
        backend: &'a B,
        resolver: ProjectionResolver<'a>,
        config: &'a LoadoutConfig,
        loaders: &'a LoaderMap<B>,
        params: &'a Params,
    ) -> Self {
        Self {
            backend,
            resolver,
            config,
            loaders,
            params,
            reuse_loaded: false,
        }
    }

    /// Skip the preload of associations every record already holds.
    pub fn reuse_loaded(mut self, reuse: bool) -> Self {
        self.reuse_loaded = reuse;
        self
    }

    /// Load everything `selection` asks for beyond the base columns.
    ///
    /// `path` holds the association names already descended through.
    pub fn materialize<'s>(
        &'s self,
        records: &'s mut [Record],
        selection: &'s ResolvedSelection,
        path: Vec<String>,
    ) -> BoxFuture<'s, QueryResult<()>> {
        Box::pin(async move {
            if records.is_empty() {
                return Ok(());
            }

            if !selection.associations.is_empty() {
                info!(
                    entity = selection.entity(),
                    records = records.len(),
                    depth = path.len(),
                    associations = ?selection.associations.keys().collect::<Vec<_>>(),
                    "Loading associations"
                );
            }
            for (name, nested) in &selection.associations {
                self.load_association(records, selection, name, nested, &path)
                    .await?;
            }

            for name in &selection.attributes {
                let Some(attribute) = selection.schema.attribute(name) else {
                    continue;
                };
                match &attribute.implementation {
                    AttributeImpl::BatchLoaded(options) => {
                        self.load_batch_attribute(records, &selection.schema, name, options)
                            .await?
                    }
                    AttributeImpl::Nested(nested) => {
                        self.load_nested_datasource(records, selection, name, nested, &path)
                            .await?
                    }
                    _ => {}
                }
            }
            Ok(())
        })
    }

    fn check_depth(&self, entity: &str, name: &str, path: &[String]) -> QueryResult<()> {
        let max_depth = self.config.loader.max_depth;
        if path.len() >= max_depth {
            return Err(QueryError::recursive_association(entity, name, max_depth)
                .with_context(format!("Loading {}", path.join("."))));
        }
        Ok(())
    }

    async fn load_association(
        &self,
        records: &mut [Record],
        owner: &ResolvedSelection,
        name: &str,
        nested: &ResolvedSelection,
        path: &[String],
    ) -> QueryResult<()> {
        let schema = owner.schema.as_ref();
        let Some(association) = schema.association(name) else {
            return Ok(());
        };
        self.check_depth(schema.entity(), name, path)?;
        if association.is_polymorphic() {
            return Err(QueryError::unsupported_association(
                schema.entity(),
                name,
                "polymorphic associations have no statically known target",
            ));
        }

        let target = nested.schema.as_ref();
        let plan = self.resolver.preload_plan(association, nested);
        validate_joins(self.backend, &Scope::for_schema(target), &plan)?;

        let loaded = self.reuse_loaded
            && records
                .iter()
                .all(|r| self.backend.is_association_loaded(r, name));
        if loaded {
            debug!(entity = schema.entity(), association = name, "Reusing loaded association");
        } else {
            debug!(
                entity = schema.entity(),
                association = name,
                target = target.entity(),
                owners = records.len(),
                columns = ?plan.column_names().collect::<Vec<_>>(),
                "Preloading association"
            );
            self.backend
                .preload_association(records, association, target, plan.columns())
                .await?;
        }

        let mut children = Vec::new();
        let mut slots = Vec::with_capacity(records.len());
        for record in records.iter_mut() {
            match record.take_association(name) {
                Some(LoadedAssociation::One(child)) => {
                    slots.push(Slot::One(child.is_some()));
                    children.extend(child.map(|c| *c));
                }
                Some(LoadedAssociation::Many(many)) => {
                    slots.push(Slot::Many(many.len()));
                    children.extend(many);
                }
                None => slots.push(Slot::Missing),
            }
        }

        let mut child_path = path.to_vec();
        child_path.push(name.to_string());
        self.materialize(&mut children, nested, child_path).await?;

        let mut children = children.into_iter();
        for (record, slot) in records.iter_mut().zip(slots) {
            let loaded = match slot {
                Slot::One(true) => LoadedAssociation::One(children.next().map(Box::new)),
                Slot::One(false) => LoadedAssociation::One(None),
                Slot::Many(count) => LoadedAssociation::Many(children.by_ref().take(count).collect()),
                Slot::Missing => match association.cardinality {
                    Cardinality::Many => LoadedAssociation::Many(Vec::new()),
                    Cardinality::One => LoadedAssociation::One(None),
                },
            };
            record.set_association(name, loaded);
        }
        Ok(())
    }

    async fn load_batch_attribute(
        &self,
        records: &mut [Record],
        schema: &SchemaDefinition,
        name: &str,
        options: &BatchOptions,
    ) -> QueryResult<()> {
        let loader_name = options.loader_name(name);
        let loader = self
            .loaders
            .get(&(SmolStr::new(schema.entity()), loader_name.clone()))
            .ok_or_else(|| QueryError::loader_not_registered(schema.entity(), &loader_name))?;

        debug!(
            entity = schema.entity(),
            attribute = name,
            loader = %loader_name,
            records = records.len(),
            "Running batch loader"
        );
        let output = {
            let ctx = CollectionContext::new(&*records, schema, self.backend, self.params);
            loader
                .load(&ctx)
                .await
                .map_err(|e| e.with_context(format!("Loading {}.{}", schema.entity(), name)))?
        };

        let values = LoadedValues::build(name, options, output)?;
        crate::loadout_trace!(attribute = name, groups = values.len(), "Built batch values");
        let primary_key = schema.primary_key();
        for record in records.iter_mut() {
            let value = values.get(self.backend.record_identity(record, primary_key));
            record.set_loaded(name, value);
        }
        Ok(())
    }

    async fn load_nested_datasource(
        &self,
        records: &mut [Record],
        owner: &ResolvedSelection,
        name: &str,
        nested: &NestedDatasource,
        path: &[String],
    ) -> QueryResult<()> {
        let schema = owner.schema.as_ref();
        let Some(shape) = owner.nested_datasources.get(name) else {
            return Ok(());
        };
        self.check_depth(schema.entity(), name, path)?;

        let primary_key = schema.primary_key();
        let ids = distinct_keys(
            records
                .iter()
                .map(|r| self.backend.record_identity(r, primary_key)),
        );

        let mut groups: HashMap<GroupKey, Vec<Value>> = HashMap::new();
        if !ids.is_empty() {
            let target = shape.schema.as_ref();
            let mut plan = self.resolver.plan(shape);
            plan.require_column(nested.foreign_key.as_str());
            let scope = Scope::for_schema(target).where_in(nested.foreign_key.as_str(), ids);
            validate_joins(self.backend, &scope, &plan)?;
            log_query(self.backend, self.config, &scope, &plan);

            debug!(
                entity = schema.entity(),
                attribute = name,
                target = target.entity(),
                "Loading nested datasource"
            );
            let mut rows = self.backend.fetch_rows(&scope, plan.columns()).await?;

            let mut child_path = path.to_vec();
            child_path.push(name.to_string());
            self.materialize(&mut rows, shape, child_path).await?;

            for row in &rows {
                let Some(key) = self
                    .backend
                    .record_get_column(row, &nested.foreign_key)
                    .and_then(Value::group_key)
                else {
                    continue;
                };
                groups
                    .entry(key)
                    .or_default()
                    .push(Value::Object(assemble_row(shape, row)));
            }
        }

        for record in records.iter_mut() {
            let value = self
                .backend
                .record_identity(record, primary_key)
                .group_key()
                .and_then(|key| groups.get(&key))
                .map(|rows| Value::List(rows.clone()))
                .unwrap_or_else(|| Value::List(Vec::new()));
            record.set_loaded(name, value);
        }
        Ok(())
    }
}

/// Check every join the plan requires against the scope.
pub(crate) fn validate_joins<B: Backend + ?Sized>(
    backend: &B,
    scope: &Scope,
    plan: &FetchPlan,
) -> QueryResult<()> {
    for requirement in plan.join_requirements() {
        backend.validate_join(scope, &requirement.table, &requirement.attribute)?;
    }
    Ok(())
}

/// Log the rendered query when `debug.log_queries` is set.
pub(crate) fn log_query<B: Backend + ?Sized>(
    backend: &B,
    config: &LoadoutConfig,
    scope: &Scope,
    plan: &FetchPlan,
) {
    if config.debug.log_queries {
        debug!(
            backend = backend.name(),
            query = %backend.render_query_text(scope, plan.columns()),
            "Fetching rows"
        );
    }
}
