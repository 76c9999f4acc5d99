//! Error types for schema registration and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while declaring or registering schemas.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(loadout::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Attribute dependency declarations form a cycle.
    #[error("attribute dependency cycle in `{entity}`: {}", .cycle.join(" -> "))]
    #[diagnostic(
        code(loadout::schema::dependency_cycle),
        help("remove one of the `depends_on` declarations along the cycle")
    )]
    DependencyCycle { entity: String, cycle: Vec<String> },

    /// An attribute depends on a name the entity does not declare.
    #[error("attribute `{entity}.{attribute}` depends on undeclared `{dependency}`")]
    #[diagnostic(code(loadout::schema::unknown_dependency))]
    UnknownDependency {
        entity: String,
        attribute: String,
        dependency: String,
    },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(loadout::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// Invalid schema declaration.
    #[error("invalid schema `{entity}`: {message}")]
    #[diagnostic(code(loadout::schema::invalid_schema))]
    InvalidSchema { entity: String, message: String },

    /// Entity type has no registered schema.
    #[error("no schema registered for entity `{entity}`")]
    #[diagnostic(
        code(loadout::schema::not_registered),
        help("call `SchemaRegistry::register_schema` at startup")
    )]
    NotRegistered { entity: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(loadout::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(loadout::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },
}

impl SchemaError {
    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid schema error.
    pub fn invalid_schema(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a not registered error.
    pub fn not_registered(entity: impl Into<String>) -> Self {
        Self::NotRegistered {
            entity: entity.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Check if this is a dependency cycle error.
    pub fn is_dependency_cycle(&self) -> bool {
        matches!(self, Self::DependencyCycle { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_cycle_message() {
        let err = SchemaError::DependencyCycle {
            entity: "Post".into(),
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "attribute dependency cycle in `Post`: a -> b -> a"
        );
        assert!(err.is_dependency_cycle());
    }

    #[test]
    fn test_duplicate_message() {
        let err = SchemaError::duplicate("attribute", "title");
        assert_eq!(err.to_string(), "duplicate attribute `title`");
        assert!(!err.is_dependency_cycle());
    }
}
