//! # loadout-query
//!
//! Selective projection and batched association loading for loadout.
//!
//! This crate turns a requested output shape into the smallest set of backend
//! round trips that can produce it:
//! - Selection trees (`SelectionNode`) built fluently or parsed from JSON
//! - Projection resolution into a per-level `FetchPlan` of columns, query
//!   expressions and required joins
//! - Association preloading, one backend call per association per level,
//!   bounded by a recursion depth guard
//! - Batch loaders computing derived attributes once per collection
//! - Result assembly pruned to the requested keys, and an upgrade path for
//!   records already in memory
//!
//! ## Selections
//!
//! ```rust
//! use loadout_query::SelectionNode;
//! use serde_json::json;
//!
//! // Built fluently
//! let built = SelectionNode::new()
//!     .fields(["id", "title"])
//!     .relation("comments", SelectionNode::new().field("comment"));
//!
//! // Or parsed from a request body
//! let parsed = SelectionNode::from_json(&json!(["id", "title", {"comments": ["comment"]}])).unwrap();
//!
//! assert_eq!(built, parsed);
//! ```
//!
//! ## Resolution
//!
//! ```rust
//! use std::sync::Arc;
//! use loadout_query::{ProjectionResolver, SelectionNode};
//! use loadout_schema::{LoadoutConfig, SchemaRegistry, Value};
//!
//! let registry = SchemaRegistry::new();
//! let post = registry
//!     .register_with("Post", |s| {
//!         s.columns(["first_name", "last_name", "body"])
//!             .computed("initials", ["first_name", "last_name"], |_| Value::Null)
//!     })
//!     .unwrap();
//!
//! let config = LoadoutConfig::default();
//! let plan = ProjectionResolver::new(&registry, &config)
//!     .resolve(&post, &SelectionNode::new().field("initials"))
//!     .unwrap();
//!
//! assert_eq!(plan.column_names().collect::<Vec<_>>(), vec!["first_name", "last_name"]);
//! ```
//!
//! Loading goes through a [`Datasource`] bound to a [`Backend`].

pub mod assemble;
pub mod association;
pub mod backend;
pub mod collection;
pub mod datasource;
pub mod error;
pub mod loaded;
pub mod logging;
pub mod operations;
pub mod plan;
pub mod resolver;
pub mod scope;
pub mod selection;

pub use assemble::{assemble, assemble_row, can_upgrade};
pub use association::AssociationLoader;
pub use backend::Backend;
pub use collection::{CollectionContext, Params};
pub use datasource::Datasource;
pub use error::{ErrorCode, ErrorContext, IntoQueryError, QueryError, QueryResult};
pub use loaded::{BatchLoader, FnLoader, LoadedValues, LoaderMap, LoaderOutput};
pub use operations::{LoadOperation, UpgradeOperation};
pub use plan::{FetchPlan, JoinRequirement, Projection};
pub use resolver::{ProjectionResolver, ResolvedSelection};
pub use scope::{Condition, Scope, SortOrder};
pub use selection::{SelectionNode, WILDCARD};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::collection::{CollectionContext, Params};
    pub use crate::datasource::Datasource;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::loaded::{BatchLoader, FnLoader, LoaderOutput};
    pub use crate::operations::*;
    pub use crate::scope::{Scope, SortOrder};
    pub use crate::selection::SelectionNode;
}
