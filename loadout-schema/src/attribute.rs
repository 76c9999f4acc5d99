//! Attribute descriptors: how each exposed name of an entity is produced.

use std::fmt;
use std::sync::Arc;

use crate::record::Record;
use crate::value::Value;

/// A pure function of an already fetched record.
pub type ComputeFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Maps directly to a backend column.
    Column,
    /// Pure function of the fetched record, evaluated after fetch.
    Computed,
    /// Backend-native expression substituted into the projection.
    QueryExpression,
    /// Produced by a batch loader over the whole collection.
    BatchLoaded,
    /// Produced by loading a related entity type through the engine.
    NestedDatasource,
}

impl AttributeKind {
    /// Check if values of this kind are read straight from fetched columns.
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Column | Self::QueryExpression)
    }

    /// Check if values of this kind are keyed back to rows by identity.
    pub fn needs_identity(&self) -> bool {
        matches!(self, Self::BatchLoaded | Self::NestedDatasource)
    }

    /// Get the name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::Computed => "computed",
            Self::QueryExpression => "query_expression",
            Self::BatchLoaded => "batch_loaded",
            Self::NestedDatasource => "nested_datasource",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend-native projection expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExpression {
    /// Expression text, rendered verbatim by the backend.
    pub expr: String,
    /// Table the expression reads from that the base scope must join.
    pub requires_join: Option<String>,
}

/// How the raw output of a batch loader is turned into a per-identity mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Grouping {
    /// The loader already returns `(identity, value)` pairs.
    #[default]
    Keyed,
    /// Partition loader rows by the value of `key`.
    GroupBy {
        /// Field holding the parent identity.
        key: String,
        /// Keep a single value per key (the last one) instead of a list.
        one: bool,
    },
    /// Loader rows are two-element `[key, value]` lists.
    FromArray,
}

/// Options of a batch-loaded attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Name of the registered loader (defaults to `load_<attribute>`).
    pub loader: Option<String>,
    /// Grouping applied to the loader output.
    pub grouping: Grouping,
    /// Value substituted for identities missing from the loader output.
    pub default_value: Option<Value>,
}

impl BatchOptions {
    /// Options for a loader returning `(identity, value)` pairs.
    pub fn keyed() -> Self {
        Self {
            loader: None,
            grouping: Grouping::Keyed,
            default_value: None,
        }
    }

    /// Options grouping loader rows by `key` into lists.
    pub fn group_by(key: impl Into<String>) -> Self {
        Self {
            loader: None,
            grouping: Grouping::GroupBy {
                key: key.into(),
                one: false,
            },
            default_value: None,
        }
    }

    /// Options for a loader returning `[key, value]` lists.
    pub fn from_array() -> Self {
        Self {
            loader: None,
            grouping: Grouping::FromArray,
            default_value: None,
        }
    }

    /// Keep a single value per group.
    pub fn one(mut self) -> Self {
        if let Grouping::GroupBy { ref mut one, .. } = self.grouping {
            *one = true;
        }
        self
    }

    /// Use a named loader instead of `load_<attribute>`.
    pub fn loader(mut self, name: impl Into<String>) -> Self {
        self.loader = Some(name.into());
        self
    }

    /// Set the value used for identities absent from the loader output.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Resolve the loader name for an attribute.
    pub fn loader_name(&self, attribute: &str) -> String {
        self.loader
            .clone()
            .unwrap_or_else(|| format!("load_{}", attribute))
    }

    /// The effective default: the configured value, an empty list for
    /// grouped lists, otherwise null.
    pub fn effective_default(&self) -> Value {
        match (&self.default_value, &self.grouping) {
            (Some(value), _) => value.clone(),
            (None, Grouping::GroupBy { one: false, .. }) => Value::List(Vec::new()),
            (None, _) => Value::Null,
        }
    }
}

/// A related entity type loaded through the engine and keyed by foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedDatasource {
    /// Target entity type.
    pub target: String,
    /// Column on the target holding the owner's identity.
    pub foreign_key: String,
}

/// How an attribute value is produced.
#[derive(Clone)]
pub enum AttributeImpl {
    /// Plain column.
    Column,
    /// Function of the fetched record.
    Computed(ComputeFn),
    /// Backend-native expression.
    Query(QueryExpression),
    /// Batch loader.
    BatchLoaded(BatchOptions),
    /// Nested datasource.
    Nested(NestedDatasource),
}

impl fmt::Debug for AttributeImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column => write!(f, "Column"),
            Self::Computed(_) => write!(f, "Computed(<fn>)"),
            Self::Query(q) => f.debug_tuple("Query").field(q).finish(),
            Self::BatchLoaded(o) => f.debug_tuple("BatchLoaded").field(o).finish(),
            Self::Nested(n) => f.debug_tuple("Nested").field(n).finish(),
        }
    }
}

/// Declaration of one attribute of an entity.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    /// Attribute name.
    pub name: String,
    /// How the value is produced.
    pub implementation: AttributeImpl,
    /// Other attributes of the same entity this one needs fetched first.
    pub depends_on: Vec<String>,
}

impl AttributeDescriptor {
    /// A plain column attribute.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: AttributeImpl::Column,
            depends_on: Vec::new(),
        }
    }

    /// A computed attribute.
    pub fn computed<F>(
        name: impl Into<String>,
        depends_on: impl IntoIterator<Item = impl Into<String>>,
        f: F,
    ) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            implementation: AttributeImpl::Computed(Arc::new(f)),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
        }
    }

    /// A query expression attribute.
    pub fn query(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: AttributeImpl::Query(QueryExpression {
                expr: expr.into(),
                requires_join: None,
            }),
            depends_on: Vec::new(),
        }
    }

    /// A batch-loaded attribute.
    pub fn loaded(name: impl Into<String>, options: BatchOptions) -> Self {
        Self {
            name: name.into(),
            implementation: AttributeImpl::BatchLoaded(options),
            depends_on: Vec::new(),
        }
    }

    /// A nested datasource attribute.
    pub fn nested(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            implementation: AttributeImpl::Nested(NestedDatasource {
                target: target.into(),
                foreign_key: foreign_key.into(),
            }),
            depends_on: Vec::new(),
        }
    }

    /// Require the base scope to join `table` (query expressions only).
    pub fn requires_join(mut self, table: impl Into<String>) -> Self {
        if let AttributeImpl::Query(ref mut q) = self.implementation {
            q.requires_join = Some(table.into());
        }
        self
    }

    /// Declare dependencies on other attributes.
    pub fn depends_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    /// Get the kind of this attribute.
    pub fn kind(&self) -> AttributeKind {
        match self.implementation {
            AttributeImpl::Column => AttributeKind::Column,
            AttributeImpl::Computed(_) => AttributeKind::Computed,
            AttributeImpl::Query(_) => AttributeKind::QueryExpression,
            AttributeImpl::BatchLoaded(_) => AttributeKind::BatchLoaded,
            AttributeImpl::Nested(_) => AttributeKind::NestedDatasource,
        }
    }
}
