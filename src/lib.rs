//! # Loadout
//!
//! Selective projection and batched association loading for entity graphs.
//!
//! Loadout provides:
//! - A per-entity schema model of columns, computed attributes, query
//!   expressions, batch-loaded attributes, nested datasources and associations
//! - Selection trees describing exactly which keys a caller wants back
//! - A projection resolver fetching only the columns those keys need
//! - Association preloading with one backend round trip per association per
//!   level, bounded against recursive selections
//! - Batch loaders computing a derived attribute once per collection
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use loadout::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::new();
//! registry.register_with("Post", |s| {
//!     s.column("title")
//!         .has_many("comments", "Comment", "post_id")
//!         .loaded("newest_comment", BatchOptions::group_by("post_id").one())
//! })?;
//! registry.register_with("Comment", |s| s.columns(["post_id", "comment"]))?;
//!
//! let backend = MemoryBackend::new();
//! backend.insert_json("posts", json!([{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]))?;
//! backend.insert_json(
//!     "comments",
//!     json!([
//!         {"id": 1, "post_id": 1, "comment": "c1"},
//!         {"id": 2, "post_id": 1, "comment": "c2"}
//!     ]),
//! )?;
//!
//! let mut datasource = Datasource::new(Arc::new(backend), Arc::new(registry));
//! datasource.register_fn("Post", "load_newest_comment", |ctx| {
//!     let ids = ctx.ids();
//!     let comments = ctx
//!         .backend()
//!         .rows("comments")
//!         .into_iter()
//!         .filter(|c| c.get("post_id").is_some_and(|p| ids.contains(p)))
//!         .map(Value::Object);
//!     Ok(LoaderOutput::values(comments))
//! });
//!
//! let rows = datasource
//!     .load(datasource.scope("Post")?)
//!     .select(SelectionNode::new().fields(["id", "newest_comment"]))
//!     .exec()
//!     .await?;
//!
//! assert_eq!(
//!     serde_json::to_value(&rows)?,
//!     json!([
//!         {"id": 1, "newest_comment": {"id": 2, "post_id": 1, "comment": "c2"}},
//!         {"id": 2, "newest_comment": null}
//!     ])
//! );
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Schema model, values, records and configuration.
pub mod schema {
    pub use loadout_schema::*;
}

/// Selection, resolution, loading and assembly.
pub mod query {
    pub use loadout_query::*;
}

/// In-memory backend.
#[cfg(feature = "memory")]
#[cfg_attr(docsrs, doc(cfg(feature = "memory")))]
pub mod memory {
    pub use loadout_memory::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use loadout_query::prelude::*;
    pub use loadout_schema::{
        BatchOptions, LoadoutConfig, Record, Row, SchemaDefinition, SchemaRegistry, Value,
    };

    #[cfg(feature = "memory")]
    pub use loadout_memory::MemoryBackend;
}

// Re-export key types at the crate root
pub use loadout_query::{Backend, Datasource, QueryError, QueryResult, SelectionNode};
pub use loadout_schema::{LoadoutConfig, SchemaError, SchemaRegistry};
