//! # loadout-schema
//!
//! Entity schema model for the loadout projection engine.
//!
//! This crate provides:
//! - Dynamic [`Value`]s and in-memory [`Record`]s
//! - Attribute and association descriptors
//! - Per-entity [`SchemaDefinition`]s and the process-wide [`SchemaRegistry`]
//! - Configuration parser for `loadout.toml` files
//!
//! ## Example
//!
//! ```rust
//! use loadout_schema::{BatchOptions, SchemaDefinition, SchemaRegistry};
//!
//! let registry = SchemaRegistry::new();
//! registry
//!     .register_schema(
//!         SchemaDefinition::builder("Post")
//!             .columns(["title", "body"])
//!             .has_many("comments", "Comment", "post_id")
//!             .loaded("newest_comment", BatchOptions::group_by("post_id").one())
//!             .build()?,
//!     )?;
//!
//! assert!(registry.contains("Post"));
//! # Ok::<(), loadout_schema::SchemaError>(())
//! ```

pub mod association;
pub mod attribute;
pub mod config;
pub mod error;
pub mod record;
pub mod registry;
pub mod schema;
pub mod value;

pub use association::{AssociationDescriptor, AssociationTarget, Cardinality, JoinKey};
pub use attribute::{
    AttributeDescriptor, AttributeImpl, AttributeKind, BatchOptions, ComputeFn, Grouping,
    NestedDatasource, QueryExpression,
};
pub use config::LoadoutConfig;
pub use error::{SchemaError, SchemaResult};
pub use record::{LoadedAssociation, Record};
pub use registry::SchemaRegistry;
pub use schema::{SchemaBuilder, SchemaDefinition};
pub use value::{GroupKey, Row, Value, distinct_keys};
