//! Selection trees: the caller's requested output shape.
//!
//! A [`SelectionNode`] names the attributes wanted at one level of the entity
//! graph and, per association, the shape wanted one level down.
//!
//! ```rust
//! use loadout_query::SelectionNode;
//!
//! let selection = SelectionNode::new()
//!     .fields(["id", "title"])
//!     .relation("comments", SelectionNode::new().all());
//!
//! assert!(selection.has_scalar("title"));
//! assert!(selection.nested("comments").unwrap().wildcard);
//! ```

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{QueryError, QueryResult};

/// Token selecting every declared attribute of a level.
pub const WILDCARD: &str = "*";

/// Requested shape at one level of the entity graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JsonValue")]
pub struct SelectionNode {
    /// Requested attribute names, in request order.
    pub scalars: IndexSet<String>,
    /// Select every declared attribute of this level.
    pub wildcard: bool,
    /// Requested associations and their shapes.
    pub nested: IndexMap<String, SelectionNode>,
}

impl SelectionNode {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select every declared attribute of this level.
    pub fn all(mut self) -> Self {
        self.wildcard = true;
        self
    }

    /// Select one attribute. `"*"` sets the wildcard.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.add_name(name.into());
        self
    }

    /// Select several attributes.
    pub fn fields(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for name in names {
            self.add_name(name.into());
        }
        self
    }

    /// Request an association with the given nested shape.
    ///
    /// Requesting the same association twice merges the shapes.
    pub fn relation(mut self, name: impl Into<String>, node: SelectionNode) -> Self {
        self.add_nested(name.into(), node);
        self
    }

    /// Parse a selection literal.
    ///
    /// Accepts an array mixing attribute names, `"*"` and objects mapping
    /// association names to nested selections, e.g.
    /// `["id", {"comments": ["*", {"author": ["name"]}]}]`. A bare string or
    /// object is treated as a one-element array.
    pub fn from_json(value: &JsonValue) -> QueryResult<Self> {
        let mut node = Self::new();
        node.parse_into(value)?;
        Ok(node)
    }

    fn parse_into(&mut self, value: &JsonValue) -> QueryResult<()> {
        match value {
            JsonValue::String(name) => {
                self.add_name(name.clone());
                Ok(())
            }
            JsonValue::Array(items) => items.iter().try_for_each(|item| self.parse_into(item)),
            JsonValue::Object(map) => {
                for (name, shape) in map {
                    let child = Self::from_json(shape)?;
                    self.add_nested(name.clone(), child);
                }
                Ok(())
            }
            other => Err(QueryError::invalid_selection(format!(
                "expected a name, an array or an object, found `{}`",
                other
            ))),
        }
    }

    fn add_name(&mut self, name: String) {
        if name == WILDCARD {
            self.wildcard = true;
        } else {
            self.scalars.insert(name);
        }
    }

    fn add_nested(&mut self, name: String, node: SelectionNode) {
        match self.nested.get_mut(&name) {
            Some(existing) => existing.merge(node),
            None => {
                self.nested.insert(name, node);
            }
        }
    }

    /// Deep-merge another selection into this one.
    pub fn merge(&mut self, other: SelectionNode) {
        self.wildcard |= other.wildcard;
        self.scalars.extend(other.scalars);
        for (name, node) in other.nested {
            self.add_nested(name, node);
        }
    }

    /// Check if nothing at all is requested at this level.
    pub fn is_empty(&self) -> bool {
        !self.wildcard && self.scalars.is_empty() && self.nested.is_empty()
    }

    /// Check if `name` is requested as an attribute.
    pub fn has_scalar(&self, name: &str) -> bool {
        self.scalars.contains(name)
    }

    /// The shape requested for an association.
    pub fn nested(&self, name: &str) -> Option<&SelectionNode> {
        self.nested.get(name)
    }

    /// Number of levels in the tree (a lone level has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.nested.values().map(Self::depth).max().unwrap_or(0)
    }
}

impl TryFrom<JsonValue> for SelectionNode {
    type Error = QueryError;

    fn try_from(value: JsonValue) -> QueryResult<Self> {
        Self::from_json(&value)
    }
}
