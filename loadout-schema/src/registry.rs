//! Process-wide registry of entity schemas.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{SchemaBuilder, SchemaDefinition};

/// Registry of schema definitions keyed by entity type.
///
/// Definitions are validated once at registration and read-only afterwards.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<SmolStr, Arc<SchemaDefinition>>>,
}

impl SchemaRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a schema definition.
    pub fn register_schema(&self, schema: SchemaDefinition) -> SchemaResult<Arc<SchemaDefinition>> {
        validate_dependencies(&schema)?;

        let mut schemas = self.schemas.write();
        if schemas.contains_key(schema.entity()) {
            return Err(SchemaError::duplicate("schema", schema.entity()));
        }

        debug!(
            entity = schema.entity(),
            attributes = schema.attributes().count(),
            associations = schema.associations().count(),
            "Registered schema"
        );

        let schema = Arc::new(schema);
        schemas.insert(SmolStr::new(schema.entity()), Arc::clone(&schema));
        Ok(schema)
    }

    /// Declare and register a schema in one step.
    pub fn register_with<F>(&self, entity: &str, declare: F) -> SchemaResult<Arc<SchemaDefinition>>
    where
        F: FnOnce(SchemaBuilder) -> SchemaBuilder,
    {
        let schema = declare(SchemaDefinition::builder(entity)).build()?;
        self.register_schema(schema)
    }

    /// Get the schema registered for `entity`.
    pub fn get_schema(&self, entity: &str) -> SchemaResult<Arc<SchemaDefinition>> {
        self.try_get(entity)
            .ok_or_else(|| SchemaError::not_registered(entity))
    }

    /// Get the schema registered for `entity`, if any.
    pub fn try_get(&self, entity: &str) -> Option<Arc<SchemaDefinition>> {
        self.schemas.read().get(entity).cloned()
    }

    /// Check if `entity` has a registered schema.
    pub fn contains(&self, entity: &str) -> bool {
        self.schemas.read().contains_key(entity)
    }

    /// Names of all registered entities, sorted.
    pub fn entities(&self) -> Vec<String> {
        let mut names: Vec<_> = self.schemas.read().keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    /// Check if no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Check that every dependency names a fetchable or computed attribute of the
/// same entity and that the dependency graph is acyclic.
fn validate_dependencies(schema: &SchemaDefinition) -> SchemaResult<()> {
    for attribute in schema.attributes() {
        for dependency in &attribute.depends_on {
            let Some(target) = schema.attribute(dependency) else {
                return Err(SchemaError::UnknownDependency {
                    entity: schema.entity().to_string(),
                    attribute: attribute.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            if target.kind().needs_identity() {
                return Err(SchemaError::invalid_schema(
                    schema.entity(),
                    format!(
                        "`{}` cannot depend on {} attribute `{}`",
                        attribute.name,
                        target.kind(),
                        dependency
                    ),
                ));
            }
        }
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for attribute in schema.attributes() {
        visit(schema, &attribute.name, &mut marks, &mut stack)?;
    }
    Ok(())
}

fn visit<'a>(
    schema: &'a SchemaDefinition,
    name: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> SchemaResult<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(ToString::to_string).collect();
            cycle.push(name.to_string());
            return Err(SchemaError::DependencyCycle {
                entity: schema.entity().to_string(),
                cycle,
            });
        }
        None => {}
    }

    marks.insert(name, Mark::Visiting);
    stack.push(name);
    if let Some(attribute) = schema.attribute(name) {
        for dependency in &attribute.depends_on {
            visit(schema, dependency, marks, stack)?;
        }
    }
    stack.pop();
    marks.insert(name, Mark::Done);
    Ok(())
}
