//! Batch loaders and the per-identity mappings built from their output.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use loadout_schema::{BatchOptions, GroupKey, Grouping, Value};
use smol_str::SmolStr;

use crate::backend::Backend;
use crate::collection::CollectionContext;
use crate::error::{QueryError, QueryResult};

/// Raw output of a batch loader.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderOutput {
    /// A flat sequence, grouped by a key field or read as `[key, value]` lists.
    Values(Vec<Value>),
    /// Explicit `(identity, value)` pairs.
    Pairs(Vec<(Value, Value)>),
}

impl LoaderOutput {
    /// Build a flat output.
    pub fn values(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    /// Build a keyed output.
    pub fn pairs<K: Into<Value>, V: Into<Value>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Number of raw entries.
    pub fn len(&self) -> usize {
        match self {
            Self::Values(values) => values.len(),
            Self::Pairs(pairs) => pairs.len(),
        }
    }

    /// Check if the output is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes a batch-loaded attribute for a whole collection at once.
#[async_trait]
pub trait BatchLoader<B: Backend + ?Sized>: Send + Sync {
    /// Produce the raw values for every record of the collection.
    async fn load(&self, ctx: &CollectionContext<'_, B>) -> QueryResult<LoaderOutput>;
}

/// Batch loaders keyed by `(entity, loader name)`.
pub type LoaderMap<B> = HashMap<(SmolStr, String), Arc<dyn BatchLoader<B>>>;

/// Adapts a synchronous closure into a [`BatchLoader`].
pub struct FnLoader<F>(pub F);

#[async_trait]
impl<B, F> BatchLoader<B> for FnLoader<F>
where
    B: Backend + ?Sized,
    F: Fn(&CollectionContext<'_, B>) -> QueryResult<LoaderOutput> + Send + Sync,
{
    async fn load(&self, ctx: &CollectionContext<'_, B>) -> QueryResult<LoaderOutput> {
        (self.0)(ctx)
    }
}

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnLoader(<fn>)")
    }
}

/// Per-identity values of one batch-loaded attribute.
///
/// Identities missing from the loader output resolve to the default on lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedValues {
    entries: HashMap<GroupKey, Value>,
    default: Value,
}

impl LoadedValues {
    /// Turn raw loader output into a mapping according to the attribute's grouping.
    pub fn build(attribute: &str, options: &BatchOptions, output: LoaderOutput) -> QueryResult<Self> {
        let mut entries: HashMap<GroupKey, Value> = HashMap::new();

        match (&options.grouping, output) {
            (Grouping::GroupBy { key, one }, LoaderOutput::Values(values)) => {
                for value in values {
                    let Value::Object(ref row) = value else {
                        return Err(QueryError::invalid_loader_output(
                            attribute,
                            format!("group_by `{}` expects objects, found `{}`", key, value),
                        ));
                    };
                    let Some(group) = row.get(key).and_then(Value::group_key) else {
                        continue;
                    };
                    if *one {
                        entries.insert(group, value);
                    } else if let Value::List(items) =
                        entries.entry(group).or_insert_with(|| Value::List(Vec::new()))
                    {
                        items.push(value);
                    }
                }
            }
            (Grouping::FromArray, LoaderOutput::Values(values)) => {
                for value in values {
                    match value {
                        Value::List(mut pair) if pair.len() == 2 => {
                            let item = pair.pop().unwrap_or_default();
                            let key = pair.pop().unwrap_or_default();
                            insert_pair(&mut entries, key, item);
                        }
                        other => {
                            return Err(QueryError::invalid_loader_output(
                                attribute,
                                format!("expected `[key, value]` lists, found `{}`", other),
                            ));
                        }
                    }
                }
            }
            (Grouping::FromArray | Grouping::Keyed, LoaderOutput::Pairs(pairs)) => {
                for (key, value) in pairs {
                    insert_pair(&mut entries, key, value);
                }
            }
            (Grouping::GroupBy { key, .. }, LoaderOutput::Pairs(_)) => {
                return Err(QueryError::invalid_loader_output(
                    attribute,
                    format!("group_by `{}` expects a flat list of objects, found pairs", key),
                ));
            }
            (Grouping::Keyed, LoaderOutput::Values(_)) => {
                return Err(QueryError::invalid_loader_output(
                    attribute,
                    "expected `(identity, value)` pairs, found a flat list",
                ));
            }
        }

        Ok(Self {
            entries,
            default: options.effective_default(),
        })
    }

    /// Value for an identity, or the default.
    pub fn get(&self, identity: &Value) -> Value {
        identity
            .group_key()
            .and_then(|key| self.entries.get(&key))
            .unwrap_or(&self.default)
            .clone()
    }

    /// Check if an identity has an explicit entry.
    pub fn contains(&self, identity: &Value) -> bool {
        identity
            .group_key()
            .is_some_and(|key| self.entries.contains_key(&key))
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no explicit entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn insert_pair(entries: &mut HashMap<GroupKey, Value>, key: Value, value: Value) {
    if let Some(group) = key.group_key() {
        entries.insert(group, value);
    }
}
