//! Fluent operations of the [`Datasource`](crate::Datasource).
//!
//! - `LoadOperation` - Fetch a scope and materialize a selection on it
//! - `UpgradeOperation` - Bring already materialized records up to a selection

mod load;
mod upgrade;

pub use load::LoadOperation;
pub use upgrade::UpgradeOperation;
