//! Per-entity schema definitions.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::association::AssociationDescriptor;
use crate::attribute::{AttributeDescriptor, AttributeKind, BatchOptions};
use crate::error::{SchemaError, SchemaResult};
use crate::record::Record;
use crate::value::Value;

/// The declared attributes and associations of one entity type.
///
/// Immutable once built; shared as `Arc<SchemaDefinition>` through the
/// [`SchemaRegistry`](crate::SchemaRegistry).
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    entity: SmolStr,
    table: String,
    primary_key: String,
    attributes: IndexMap<String, AttributeDescriptor>,
    associations: IndexMap<String, AssociationDescriptor>,
}

impl SchemaDefinition {
    /// Start declaring a schema for `entity`.
    pub fn builder(entity: impl Into<SmolStr>) -> SchemaBuilder {
        SchemaBuilder::new(entity)
    }

    /// Entity type name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Backing table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Identity column.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values()
    }

    /// Look up an attribute.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// Associations in declaration order.
    pub fn associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.values()
    }

    /// Look up an association.
    pub fn association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.get(name)
    }

    /// Names of the plain column attributes, in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .values()
            .filter(|a| a.kind() == AttributeKind::Column)
            .map(|a| a.name.as_str())
    }

    /// Check if `name` is a declared attribute or association.
    pub fn declares(&self, name: &str) -> bool {
        self.attributes.contains_key(name) || self.associations.contains_key(name)
    }

    /// Position of an attribute in declaration order.
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.get_index_of(name)
    }
}

/// Builder for [`SchemaDefinition`].
///
/// `has_many` and `has_one` reference the owner's primary key as declared at
/// [`build`](SchemaBuilder::build) time, so `primary_key` may be set in any order.
#[derive(Debug)]
pub struct SchemaBuilder {
    entity: SmolStr,
    table: Option<String>,
    primary_key: String,
    attributes: Vec<AttributeDescriptor>,
    associations: Vec<AssociationDescriptor>,
    owner_keyed: Vec<usize>,
}

impl SchemaBuilder {
    fn new(entity: impl Into<SmolStr>) -> Self {
        Self {
            entity: entity.into(),
            table: None,
            primary_key: "id".to_string(),
            attributes: Vec::new(),
            associations: Vec::new(),
            owner_keyed: Vec::new(),
        }
    }

    /// Set the backing table (defaults to the lowercased entity name plus `s`).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the identity column (defaults to `id`).
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Declare an attribute.
    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare a plain column.
    pub fn column(self, name: impl Into<String>) -> Self {
        self.attribute(AttributeDescriptor::column(name))
    }

    /// Declare several plain columns.
    pub fn columns(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for name in names {
            self = self.column(name);
        }
        self
    }

    /// Declare a computed attribute depending on `depends_on`.
    pub fn computed<F>(
        self,
        name: impl Into<String>,
        depends_on: impl IntoIterator<Item = impl Into<String>>,
        f: F,
    ) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.attribute(AttributeDescriptor::computed(name, depends_on, f))
    }

    /// Declare a query expression attribute.
    pub fn query(self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.attribute(AttributeDescriptor::query(name, expr))
    }

    /// Declare a query expression attribute that needs `table` joined.
    pub fn query_with_join(
        self,
        name: impl Into<String>,
        expr: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        self.attribute(AttributeDescriptor::query(name, expr).requires_join(table))
    }

    /// Declare a batch-loaded attribute.
    pub fn loaded(self, name: impl Into<String>, options: BatchOptions) -> Self {
        self.attribute(AttributeDescriptor::loaded(name, options))
    }

    /// Declare a batch-loaded attribute whose loader reads the given columns.
    pub fn loaded_with(
        self,
        name: impl Into<String>,
        options: BatchOptions,
        depends_on: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.attribute(AttributeDescriptor::loaded(name, options).depends_on(depends_on))
    }

    /// Declare a nested datasource attribute.
    pub fn nested(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.attribute(AttributeDescriptor::nested(name, target, foreign_key))
    }

    /// Declare an association.
    pub fn association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    /// Declare a `belongs_to` association referencing the target's `id`.
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(AssociationDescriptor::belongs_to(
            name,
            target,
            foreign_key,
            "id",
        ))
    }

    /// Declare a `has_many` association keyed by this entity's primary key.
    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.owner_keyed.push(self.associations.len());
        self.association(AssociationDescriptor::has_many(
            name,
            target,
            String::new(),
            foreign_key,
        ))
    }

    /// Declare a `has_one` association keyed by this entity's primary key.
    pub fn has_one(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.owner_keyed.push(self.associations.len());
        self.association(AssociationDescriptor::has_one(
            name,
            target,
            String::new(),
            foreign_key,
        ))
    }

    /// Declare a polymorphic `belongs_to` association.
    pub fn polymorphic(
        self,
        name: impl Into<String>,
        type_column: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.association(AssociationDescriptor::polymorphic(
            name,
            type_column,
            foreign_key,
        ))
    }

    /// Finish the definition.
    ///
    /// The primary key is declared as the first column when missing.
    /// Duplicate attribute or association names are rejected.
    pub fn build(self) -> SchemaResult<SchemaDefinition> {
        let table = self
            .table
            .unwrap_or_else(|| format!("{}s", self.entity.to_lowercase()));

        if self.primary_key.is_empty() {
            return Err(SchemaError::invalid_schema(
                self.entity.as_str(),
                "primary key must not be empty",
            ));
        }

        let mut attributes = IndexMap::with_capacity(self.attributes.len() + 1);
        if !self.attributes.iter().any(|a| a.name == self.primary_key) {
            attributes.insert(
                self.primary_key.clone(),
                AttributeDescriptor::column(self.primary_key.clone()),
            );
        }
        for attribute in self.attributes {
            if attributes.contains_key(&attribute.name) {
                return Err(SchemaError::duplicate(
                    "attribute",
                    format!("{}.{}", self.entity, attribute.name),
                ));
            }
            attributes.insert(attribute.name.clone(), attribute);
        }

        let mut associations = IndexMap::with_capacity(self.associations.len());
        for (index, mut association) in self.associations.into_iter().enumerate() {
            if self.owner_keyed.contains(&index) {
                association.join_key.local = self.primary_key.clone();
            }
            if attributes.contains_key(&association.name)
                || associations.contains_key(&association.name)
            {
                return Err(SchemaError::duplicate(
                    "association",
                    format!("{}.{}", self.entity, association.name),
                ));
            }
            associations.insert(association.name.clone(), association);
        }

        Ok(SchemaDefinition {
            entity: self.entity,
            table,
            primary_key: self.primary_key,
            attributes,
            associations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeImpl;

    #[test]
    fn test_builder_defaults() {
        let schema = SchemaDefinition::builder("Post")
            .columns(["title", "body"])
            .build()
            .unwrap();

        assert_eq!(schema.table(), "posts");
        assert_eq!(schema.primary_key(), "id");
        let names: Vec<_> = schema.column_names().collect();
        assert_eq!(names, vec!["id", "title", "body"]);
    }

    #[test]
    fn test_declared_primary_key_keeps_position() {
        let schema = SchemaDefinition::builder("Tag")
            .table("labels")
            .primary_key("slug")
            .columns(["name", "slug"])
            .build()
            .unwrap();

        let names: Vec<_> = schema.column_names().collect();
        assert_eq!(names, vec!["name", "slug"]);
        assert_eq!(schema.attribute_index("slug"), Some(1));
    }

    #[test]
    fn test_has_many_uses_primary_key_at_build() {
        let schema = SchemaDefinition::builder("Blog")
            .has_many("posts", "Post", "blog_id")
            .primary_key("uuid")
            .build()
            .unwrap();

        let posts = schema.association("posts").unwrap();
        assert_eq!(posts.join_key.local, "uuid");
        assert_eq!(posts.join_key.remote, "blog_id");
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let err = SchemaDefinition::builder("Post")
            .column("title")
            .query("title", "upper(title)")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { .. }));
    }

    #[test]
    fn test_association_clashing_with_attribute_rejected() {
        let err = SchemaDefinition::builder("Post")
            .column("author")
            .belongs_to("author", "User", "author_id")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { .. }));
    }

    #[test]
    fn test_query_with_join() {
        let schema = SchemaDefinition::builder("Post")
            .query_with_join("blog_name", "blogs.name", "blogs")
            .build()
            .unwrap();

        let attr = schema.attribute("blog_name").unwrap();
        match &attr.implementation {
            AttributeImpl::Query(q) => assert_eq!(q.requires_join.as_deref(), Some("blogs")),
            other => panic!("unexpected implementation {:?}", other),
        }
        assert!(schema.declares("blog_name"));
        assert!(!schema.declares("ghost_field"));
    }

    #[test]
    fn test_loaded_with_dependencies() {
        let schema = SchemaDefinition::builder("Post")
            .column("author_last_name")
            .loaded_with(
                "shouted_author",
                BatchOptions::keyed(),
                ["author_last_name"],
            )
            .build()
            .unwrap();

        let attr = schema.attribute("shouted_author").unwrap();
        assert_eq!(attr.kind(), AttributeKind::BatchLoaded);
        assert_eq!(attr.depends_on, vec!["author_last_name".to_string()]);
    }
}
