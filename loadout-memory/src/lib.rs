//! In-memory backend for loadout.
//!
//! `MemoryBackend` implements the loadout `Backend` capability over tables of
//! rows held in memory. It is meant for tests and examples: every fetch and
//! preload is counted, and the SQL a relational backend would run is rendered
//! into a query log.
//!
//! # Features
//!
//! - Equality and `IN` filtering, ordering and limits
//! - Query expressions evaluated by registered Rust closures
//! - One round trip per association preload, whatever the number of owners
//! - Call counters, query log and failure injection
//!
//! # Example
//!
//! ```rust
//! use loadout_memory::MemoryBackend;
//! use loadout_query::{Backend, Projection, Scope};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backend = MemoryBackend::new();
//! backend
//!     .insert_json("posts", json!([{"id": 1, "title": "Hello"}, {"id": 2, "title": "World"}]))
//!     .unwrap();
//!
//! let scope = Scope::new("Post", "posts").r#where("id", 2);
//! let records = backend
//!     .fetch_rows(&scope, &[Projection::Column("title".into())])
//!     .await
//!     .unwrap();
//!
//! assert_eq!(records[0].get("title").and_then(|v| v.as_str()), Some("World"));
//! assert_eq!(backend.fetch_count(), 1);
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod sql;
pub mod table;

pub use backend::{ExpressionFn, MemoryBackend};
pub use error::{MemoryError, MemoryResult};
pub use sql::render_select;
pub use table::Table;
