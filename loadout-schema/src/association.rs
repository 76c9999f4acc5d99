//! Association descriptors between entity types.

/// Cardinality of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one related record.
    One,
    /// Any number of related records.
    Many,
}

impl Cardinality {
    /// Check if this association returns multiple records.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many)
    }
}

/// The entity type an association points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationTarget {
    /// A statically known entity type.
    Entity(String),
    /// The related type varies per record and is named by `type_column`.
    Polymorphic {
        /// Column holding the related entity type name.
        type_column: String,
    },
}

/// Columns matching owner rows to related rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKey {
    /// Column on the owning entity.
    pub local: String,
    /// Column on the related entity.
    pub remote: String,
}

impl JoinKey {
    /// Create a new join key.
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }
}

/// Declaration of one association of an entity.
///
/// The target is held by name, so schemas may reference each other in cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDescriptor {
    /// Association name.
    pub name: String,
    /// Related entity type.
    pub target: AssociationTarget,
    /// Cardinality.
    pub cardinality: Cardinality,
    /// Join columns.
    pub join_key: JoinKey,
}

impl AssociationDescriptor {
    /// Create a new association descriptor.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
        join_key: JoinKey,
    ) -> Self {
        Self {
            name: name.into(),
            target: AssociationTarget::Entity(target.into()),
            cardinality,
            join_key,
        }
    }

    /// `belongs_to`: the foreign key lives on the owner and references `references`
    /// on the target.
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        references: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            target,
            Cardinality::One,
            JoinKey::new(foreign_key, references),
        )
    }

    /// `has_many`: the foreign key lives on the target and references
    /// `owner_key` on the owner.
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        owner_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            target,
            Cardinality::Many,
            JoinKey::new(owner_key, foreign_key),
        )
    }

    /// `has_one`: like `has_many` but keeps the first related record.
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        owner_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            target,
            Cardinality::One,
            JoinKey::new(owner_key, foreign_key),
        )
    }

    /// Polymorphic `belongs_to` whose target type is read from `type_column`.
    pub fn polymorphic(
        name: impl Into<String>,
        type_column: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: AssociationTarget::Polymorphic {
                type_column: type_column.into(),
            },
            cardinality: Cardinality::One,
            join_key: JoinKey::new(foreign_key, "id"),
        }
    }

    /// The statically known target entity, if any.
    pub fn target_entity(&self) -> Option<&str> {
        match &self.target {
            AssociationTarget::Entity(name) => Some(name),
            AssociationTarget::Polymorphic { .. } => None,
        }
    }

    /// Check if the target type varies per record.
    pub fn is_polymorphic(&self) -> bool {
        matches!(self.target, AssociationTarget::Polymorphic { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_belongs_to_join_key() {
        let assoc = AssociationDescriptor::belongs_to("author", "User", "author_id", "id");
        assert_eq!(assoc.cardinality, Cardinality::One);
        assert_eq!(assoc.join_key, JoinKey::new("author_id", "id"));
        assert_eq!(assoc.target_entity(), Some("User"));
    }

    #[test]
    fn test_has_many_join_key() {
        let assoc = AssociationDescriptor::has_many("comments", "Comment", "id", "post_id");
        assert!(assoc.cardinality.is_many());
        assert_eq!(assoc.join_key.local, "id");
        assert_eq!(assoc.join_key.remote, "post_id");
    }

    #[test]
    fn test_polymorphic_has_no_static_target() {
        let assoc = AssociationDescriptor::polymorphic("commentable", "commentable_type", "commentable_id");
        assert!(assoc.is_polymorphic());
        assert_eq!(assoc.target_entity(), None);
        assert_eq!(assoc.join_key.local, "commentable_id");
    }
}
