//! Projection resolution: from a requested selection to a minimal fetch plan.
//!
//! Resolution happens in two steps, both free of I/O:
//!
//! 1. [`ProjectionResolver::normalize`] checks a [`SelectionNode`] against the
//!    schemas it reaches and produces a [`ResolvedSelection`]: wildcards are
//!    expanded, undeclared names rejected or dropped, associations resolved to
//!    their target schemas and the nesting depth bounded.
//! 2. [`ProjectionResolver::plan`] turns one level of a resolved selection into
//!    the [`FetchPlan`] for that level's entity.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use loadout_schema::{
    AssociationDescriptor, AttributeImpl, AttributeKind, LoadoutConfig, SchemaDefinition,
    SchemaRegistry,
};
use tracing::{trace, warn};

use crate::error::{QueryError, QueryResult};
use crate::plan::FetchPlan;
use crate::selection::SelectionNode;

/// A selection checked against its schemas.
#[derive(Debug, Clone)]
pub struct ResolvedSelection {
    /// Schema of the entity this level selects from.
    pub schema: Arc<SchemaDefinition>,
    /// Selected attributes in declaration order, all kinds.
    pub attributes: Vec<String>,
    /// Selected associations in request order.
    pub associations: IndexMap<String, ResolvedSelection>,
    /// Shapes of the selected nested datasource attributes.
    pub nested_datasources: IndexMap<String, ResolvedSelection>,
}

impl ResolvedSelection {
    /// Entity this level selects from.
    pub fn entity(&self) -> &str {
        self.schema.entity()
    }

    /// Output keys of a row at this level: attributes, then associations.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(String::as_str)
            .chain(self.associations.keys().map(String::as_str))
    }

    /// Check if an attribute is selected.
    pub fn selects(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }
}

/// Resolves selections against the registered schemas.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionResolver<'a> {
    registry: &'a SchemaRegistry,
    config: &'a LoadoutConfig,
}

impl<'a> ProjectionResolver<'a> {
    /// Create a resolver over a registry.
    pub fn new(registry: &'a SchemaRegistry, config: &'a LoadoutConfig) -> Self {
        Self { registry, config }
    }

    /// Normalize and plan the top level of a selection.
    pub fn resolve(
        &self,
        schema: &Arc<SchemaDefinition>,
        selection: &SelectionNode,
    ) -> QueryResult<FetchPlan> {
        let resolved = self.normalize(schema, selection)?;
        Ok(self.plan(&resolved))
    }

    /// Check a whole selection tree against the schemas it reaches.
    pub fn normalize(
        &self,
        schema: &Arc<SchemaDefinition>,
        selection: &SelectionNode,
    ) -> QueryResult<ResolvedSelection> {
        self.normalize_level(schema, selection, 0)
    }

    fn normalize_level(
        &self,
        schema: &Arc<SchemaDefinition>,
        selection: &SelectionNode,
        depth: usize,
    ) -> QueryResult<ResolvedSelection> {
        let strict = self.config.selection.strict;
        let mut selected: HashSet<&str> = HashSet::new();
        let mut nested_shapes: IndexMap<String, SelectionNode> = IndexMap::new();
        let mut association_shapes: IndexMap<String, SelectionNode> = IndexMap::new();

        if selection.is_empty() {
            selected.extend(schema.column_names());
        }
        if selection.wildcard {
            selected.extend(schema.attributes().map(|a| a.name.as_str()));
        }

        for name in &selection.scalars {
            if let Some(attribute) = schema.attribute(name) {
                selected.insert(&attribute.name);
            } else if schema.association(name).is_some() {
                merge_shape(&mut association_shapes, name, SelectionNode::new().all());
            } else if strict {
                return Err(QueryError::unknown_attribute(schema.entity(), name.as_str()));
            } else {
                warn!(entity = schema.entity(), attribute = %name, "Dropping undeclared attribute");
            }
        }

        for (name, shape) in &selection.nested {
            if schema.association(name).is_some() {
                merge_shape(&mut association_shapes, name, shape.clone());
            } else if let Some(attribute) = schema.attribute(name) {
                if attribute.kind() == AttributeKind::NestedDatasource {
                    selected.insert(&attribute.name);
                    merge_shape(&mut nested_shapes, name, shape.clone());
                } else if strict {
                    return Err(QueryError::invalid_selection(format!(
                        "`{}.{}` is a {} attribute and takes no nested selection",
                        schema.entity(),
                        name,
                        attribute.kind()
                    ))
                    .with_entity(schema.entity())
                    .with_field(name.as_str()));
                } else {
                    warn!(entity = schema.entity(), attribute = %name, "Ignoring nested selection on a scalar attribute");
                    selected.insert(&attribute.name);
                }
            } else if strict {
                return Err(QueryError::unknown_attribute(schema.entity(), name.as_str()));
            } else {
                warn!(entity = schema.entity(), association = %name, "Dropping undeclared association");
            }
        }

        let attributes: Vec<String> = schema
            .attributes()
            .filter(|a| selected.contains(a.name.as_str()))
            .map(|a| a.name.clone())
            .collect();

        let mut nested_datasources = IndexMap::new();
        for attribute in schema.attributes().filter(|a| selected.contains(a.name.as_str())) {
            let AttributeImpl::Nested(nested) = &attribute.implementation else {
                continue;
            };
            self.check_depth(schema, &attribute.name, depth)?;
            let target = self.registry.get_schema(&nested.target)?;
            let shape = nested_shapes.shift_remove(&attribute.name).unwrap_or_default();
            let resolved = self.normalize_level(&target, &shape, depth + 1)?;
            nested_datasources.insert(attribute.name.clone(), resolved);
        }

        let mut associations = IndexMap::new();
        for (name, shape) in association_shapes {
            let Some(association) = schema.association(&name) else {
                continue;
            };
            self.check_depth(schema, &name, depth)?;
            let target = self.target_schema(schema, association)?;
            let resolved = self.normalize_level(&target, &shape, depth + 1)?;
            associations.insert(name, resolved);
        }

        trace!(
            entity = schema.entity(),
            attributes = ?attributes,
            associations = associations.len(),
            "Normalized selection"
        );

        Ok(ResolvedSelection {
            schema: Arc::clone(schema),
            attributes,
            associations,
            nested_datasources,
        })
    }

    fn check_depth(&self, schema: &SchemaDefinition, name: &str, depth: usize) -> QueryResult<()> {
        let max_depth = self.config.loader.max_depth;
        if depth >= max_depth {
            return Err(QueryError::recursive_association(schema.entity(), name, max_depth));
        }
        Ok(())
    }

    /// The statically known target schema of an association.
    pub fn target_schema(
        &self,
        schema: &SchemaDefinition,
        association: &AssociationDescriptor,
    ) -> QueryResult<Arc<SchemaDefinition>> {
        let Some(target) = association.target_entity() else {
            return Err(QueryError::unsupported_association(
                schema.entity(),
                association.name.as_str(),
                "polymorphic associations have no statically known target",
            ));
        };
        self.registry.try_get(target).ok_or_else(|| {
            QueryError::unsupported_association(
                schema.entity(),
                association.name.as_str(),
                format!("target entity `{}` is not registered", target),
            )
        })
    }

    /// Fetch plan of one level of a resolved selection.
    ///
    /// Each selected attribute contributes its dependencies first, then itself:
    /// columns their name, query expressions their expression (and join),
    /// batch-loaded and nested datasource attributes the identity column.
    /// Association join keys on the owner side are appended last.
    pub fn plan(&self, selection: &ResolvedSelection) -> FetchPlan {
        let schema = selection.schema.as_ref();
        let mut plan = FetchPlan::new();
        if self.config.selection.simple_mode {
            for column in schema.column_names() {
                plan.require_column(column);
            }
        }

        let mut visited = IndexSet::new();
        for name in &selection.attributes {
            contribute(schema, name, &mut plan, &mut visited);
        }

        for name in selection.associations.keys() {
            if let Some(association) = schema.association(name) {
                plan.require_column(association.join_key.local.as_str());
            }
        }
        plan
    }

    /// Fetch plan for the target rows of an association preload.
    ///
    /// Adds the target-side join key so rows can be matched to their owners.
    pub fn preload_plan(
        &self,
        association: &AssociationDescriptor,
        selection: &ResolvedSelection,
    ) -> FetchPlan {
        let mut plan = self.plan(selection);
        plan.require_column(association.join_key.remote.as_str());
        plan
    }
}

fn merge_shape(shapes: &mut IndexMap<String, SelectionNode>, name: &str, shape: SelectionNode) {
    match shapes.get_mut(name) {
        Some(existing) => existing.merge(shape),
        None => {
            shapes.insert(name.to_string(), shape);
        }
    }
}

fn contribute<'s>(
    schema: &'s SchemaDefinition,
    name: &'s str,
    plan: &mut FetchPlan,
    visited: &mut IndexSet<&'s str>,
) {
    if !visited.insert(name) {
        return;
    }
    let Some(attribute) = schema.attribute(name) else {
        return;
    };
    for dependency in &attribute.depends_on {
        contribute(schema, dependency, plan, visited);
    }
    match &attribute.implementation {
        AttributeImpl::Column => plan.require_column(name),
        AttributeImpl::Computed(_) => {}
        AttributeImpl::Query(query) => {
            plan.require_expression(name, query.expr.as_str());
            if let Some(table) = &query.requires_join {
                plan.require_join(table.as_str(), name);
            }
        }
        AttributeImpl::BatchLoaded(_) | AttributeImpl::Nested(_) => {
            plan.require_column(schema.primary_key())
        }
    }
}
