//! Error types for selection resolution and loading, with actionable messages.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: L{category}{number}
//! - 1xxx: Selection and projection errors (unknown attribute, missing join)
//! - 3xxx: Loading errors (recursion, batch loaders)
//! - 5xxx: Backend errors (passed through unmodified)
//! - 7xxx: Configuration and schema errors
//!
//! ```rust
//! use loadout_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::unknown_attribute("Post", "ghost_field");
//! assert_eq!(err.code, ErrorCode::UnknownAttribute);
//! assert!(err.to_string().contains("ghost_field"));
//! ```

use std::fmt;

use loadout_schema::SchemaError;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Selection errors (1xxx)
    /// Selection names an undeclared attribute (L1001).
    UnknownAttribute = 1001,
    /// Malformed selection literal (L1002).
    InvalidSelection = 1002,
    /// Query expression needs a join the scope lacks (L1003).
    MissingJoin = 1003,
    /// Association cannot be resolved statically (L1004).
    UnsupportedAssociation = 1004,

    // Loading errors (3xxx)
    /// Association recursion exceeded the depth bound (L3001).
    RecursiveAssociation = 3001,
    /// No batch loader registered under the requested name (L3002).
    LoaderNotRegistered = 3002,
    /// Batch loader output does not match the declared grouping (L3003).
    InvalidLoaderOutput = 3003,

    // Backend errors (5xxx)
    /// Backend failure (L5001).
    Backend = 5001,

    // Configuration errors (7xxx)
    /// Invalid configuration (L7001).
    InvalidConfiguration = 7001,
    /// Attribute dependency cycle (L7002).
    DependencyCycle = 7002,
    /// Entity has no registered schema (L7003).
    SchemaNotRegistered = 7003,
}

impl ErrorCode {
    /// Get the error code string (e.g., "L1001").
    pub fn code(&self) -> String {
        format!("L{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownAttribute => "Unknown attribute",
            Self::InvalidSelection => "Invalid selection",
            Self::MissingJoin => "Missing join",
            Self::UnsupportedAssociation => "Unsupported association",
            Self::RecursiveAssociation => "Recursive association",
            Self::LoaderNotRegistered => "Batch loader not registered",
            Self::InvalidLoaderOutput => "Invalid batch loader output",
            Self::Backend => "Backend error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::DependencyCycle => "Attribute dependency cycle",
            Self::SchemaNotRegistered => "Schema not registered",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The entity involved.
    pub entity: Option<String>,
    /// The attribute or association involved.
    pub field: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while resolving or loading a selection.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the attribute or association.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an unknown attribute error.
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        let entity = entity.into();
        let attribute = attribute.into();
        Self::new(
            ErrorCode::UnknownAttribute,
            format!("`{}` does not declare attribute `{}`", entity, attribute),
        )
        .with_entity(&entity)
        .with_field(&attribute)
        .with_suggestion(format!("Declare `{}` on the {} schema", attribute, entity))
        .with_help("Set `selection.strict = false` to drop undeclared names instead")
    }

    /// Create an invalid selection error.
    pub fn invalid_selection(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidSelection,
            format!("Invalid selection: {}", message.into()),
        )
        .with_help(r#"Selections look like ["id", "*", {"comments": ["body"]}]"#)
    }

    /// Create a missing join error.
    pub fn missing_join(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let attribute = attribute.into();
        let table = table.into();
        Self::new(
            ErrorCode::MissingJoin,
            format!(
                "`{}.{}` requires table `{}` to be joined in the scope",
                entity, attribute, table
            ),
        )
        .with_entity(&entity)
        .with_field(&attribute)
        .with_suggestion(format!("Add `.join(\"JOIN {} ON ...\")` to the scope", table))
    }

    /// Create a recursive association error.
    pub fn recursive_association(
        entity: impl Into<String>,
        association: impl Into<String>,
        depth: usize,
    ) -> Self {
        let entity = entity.into();
        let association = association.into();
        Self::new(
            ErrorCode::RecursiveAssociation,
            format!(
                "Recursive association `{}.{}` exceeds the maximum depth of {}",
                entity, association, depth
            ),
        )
        .with_entity(&entity)
        .with_field(&association)
        .with_suggestion("Check the selection for unbounded repetition of an association cycle")
        .with_help("Raise `loader.max_depth` if the nesting is intended")
    }

    /// Create an unsupported association error.
    pub fn unsupported_association(
        entity: impl Into<String>,
        association: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let association = association.into();
        Self::new(
            ErrorCode::UnsupportedAssociation,
            format!(
                "Association `{}.{}` is not supported: {}",
                entity,
                association,
                reason.into()
            ),
        )
        .with_entity(&entity)
        .with_field(&association)
    }

    /// Create a dependency cycle error.
    pub fn dependency_cycle(entity: impl Into<String>, cycle: &[String]) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::DependencyCycle,
            format!(
                "Attribute dependency cycle in `{}`: {}",
                entity,
                cycle.join(" -> ")
            ),
        )
        .with_entity(&entity)
    }

    /// Create a loader not registered error.
    pub fn loader_not_registered(entity: impl Into<String>, loader: impl Into<String>) -> Self {
        let entity = entity.into();
        let loader = loader.into();
        Self::new(
            ErrorCode::LoaderNotRegistered,
            format!("No batch loader `{}` registered for `{}`", loader, entity),
        )
        .with_entity(&entity)
        .with_field(&loader)
        .with_suggestion(format!(
            "Call `register_loader(\"{}\", \"{}\", ...)` on the datasource",
            entity, loader
        ))
    }

    /// Create an invalid loader output error.
    pub fn invalid_loader_output(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self::new(
            ErrorCode::InvalidLoaderOutput,
            format!(
                "Batch loader output for `{}` is invalid: {}",
                attribute,
                message.into()
            ),
        )
        .with_field(&attribute)
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Backend, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Invalid configuration: {}", message.into()),
        )
    }

    /// Create a schema not registered error.
    pub fn schema_not_registered(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::SchemaNotRegistered,
            format!("No schema registered for `{}`", entity),
        )
        .with_entity(&entity)
        .with_suggestion("Register every entity reachable from the selection at startup")
    }

    // ============== Error Checks ==============

    /// Check if this is an unknown attribute error.
    pub fn is_unknown_attribute(&self) -> bool {
        self.code == ErrorCode::UnknownAttribute
    }

    /// Check if this is a missing join error.
    pub fn is_missing_join(&self) -> bool {
        self.code == ErrorCode::MissingJoin
    }

    /// Check if this is a recursive association error.
    pub fn is_recursive_association(&self) -> bool {
        self.code == ErrorCode::RecursiveAssociation
    }

    /// Check if this is an unsupported association error.
    pub fn is_unsupported_association(&self) -> bool {
        self.code == ErrorCode::UnsupportedAssociation
    }

    /// Check if this is a dependency cycle error.
    pub fn is_dependency_cycle(&self) -> bool {
        self.code == ErrorCode::DependencyCycle
    }

    /// Check if this is a backend error.
    pub fn is_backend(&self) -> bool {
        self.code == ErrorCode::Backend
    }

    /// Check if this is a batch loader error.
    pub fn is_loader_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::LoaderNotRegistered | ErrorCode::InvalidLoaderOutput
        )
    }

    // ============== Display Functions ==============

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = format!("Error [{}]: {}\n", self.code.code(), self.message);

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  -> While: {}\n", op));
        }
        if let Some(ref entity) = self.context.entity {
            output.push_str(&format!("  -> Entity: {}\n", entity));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  -> Field: {}\n", field));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

impl From<SchemaError> for QueryError {
    fn from(err: SchemaError) -> Self {
        let mapped = match &err {
            SchemaError::DependencyCycle { entity, cycle } => {
                Self::dependency_cycle(entity.clone(), cycle)
            }
            SchemaError::NotRegistered { entity } => Self::schema_not_registered(entity.clone()),
            other => Self::configuration(other.to_string()),
        };
        mapped.with_source(err)
    }
}

/// Extension trait for converting foreign errors into backend errors.
pub trait IntoQueryError {
    /// Convert to a QueryError, keeping `self` as the source.
    fn into_query_error(self) -> QueryError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoQueryError for E {
    fn into_query_error(self) -> QueryError {
        QueryError::backend(self.to_string()).with_source(self)
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::UnknownAttribute.code(), "L1001");
        assert_eq!(ErrorCode::RecursiveAssociation.code(), "L3001");
        assert_eq!(ErrorCode::Backend.code(), "L5001");
        assert_eq!(ErrorCode::DependencyCycle.code(), "L7002");
    }

    #[test]
    fn test_codes_stay_in_documented_categories() {
        let codes = [
            ErrorCode::UnknownAttribute,
            ErrorCode::InvalidSelection,
            ErrorCode::MissingJoin,
            ErrorCode::UnsupportedAssociation,
            ErrorCode::RecursiveAssociation,
            ErrorCode::LoaderNotRegistered,
            ErrorCode::InvalidLoaderOutput,
            ErrorCode::Backend,
            ErrorCode::InvalidConfiguration,
            ErrorCode::DependencyCycle,
            ErrorCode::SchemaNotRegistered,
        ];
        for code in codes {
            let category = code.code().chars().nth(1);
            assert!(
                matches!(category, Some('1' | '3' | '5' | '7')),
                "{} outside the documented categories",
                code
            );
            assert!(!code.description().is_empty());
        }
    }

    #[test]
    fn test_unknown_attribute_error() {
        let err = QueryError::unknown_attribute("Post", "ghost_field");
        assert!(err.is_unknown_attribute());
        assert_eq!(err.context.entity, Some("Post".to_string()));
        assert_eq!(err.context.field, Some("ghost_field".to_string()));
        assert!(err.to_string().starts_with("[L1001]"));
    }

    #[test]
    fn test_missing_join_names_attribute_and_table() {
        let err = QueryError::missing_join("Post", "blog_name", "blogs");
        assert!(err.is_missing_join());
        assert!(err.message.contains("blog_name"));
        assert!(err.message.contains("blogs"));
    }

    #[test]
    fn test_recursive_association_error() {
        let err = QueryError::recursive_association("Node", "parent", 32);
        assert!(err.is_recursive_association());
        assert!(err.message.contains("parent"));
        assert!(err.message.contains("32"));
    }

    #[test]
    fn test_from_schema_error() {
        let err: QueryError = SchemaError::DependencyCycle {
            entity: "Post".into(),
            cycle: vec!["a".into(), "b".into(), "a".into()],
        }
        .into();
        assert!(err.is_dependency_cycle());
        assert!(err.message.contains("a -> b -> a"));
        assert!(err.source.is_some());

        let err: QueryError = SchemaError::not_registered("Tag").into();
        assert_eq!(err.code, ErrorCode::SchemaNotRegistered);

        let err: QueryError = SchemaError::duplicate("schema", "Post").into();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_foreign_error_becomes_backend_error() {
        let io = std::io::Error::other("connection reset");
        let err = io.into_query_error();
        assert!(err.is_backend());
        assert_eq!(err.message, "connection reset");
        assert!(err.source.is_some());
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::loader_not_registered("Post", "load_newest_comment")
            .with_context("Loading Post.newest_comment");

        let output = err.display_full();
        assert!(output.contains("L3002"));
        assert!(output.contains("While: Loading Post.newest_comment"));
        assert!(output.contains("Suggestions"));
    }

    #[test]
    fn test_error_macro() {
        let err = query_error!(
            ErrorCode::InvalidSelection,
            "unexpected number",
            with_field = "comments",
            with_suggestion = "Use a string or an object"
        );

        assert_eq!(err.code, ErrorCode::InvalidSelection);
        assert_eq!(err.context.field, Some("comments".to_string()));
        assert!(!err.is_loader_error());
    }
}
