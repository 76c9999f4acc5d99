//! Dynamic values carried by records and assembled rows.

use std::cmp::Ordering;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// An insertion-ordered map of attribute names to values.
pub type Row = IndexMap<String, Value>;

/// A dynamically typed value.
///
/// Serializes untagged, so an assembled [`Row`] renders as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values.
    List(Vec<Value>),
    /// Nested row.
    Object(Row),
}

impl Value {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a nested row.
    pub fn as_object(&self) -> Option<&Row> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a field of a nested row.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|row| row.get(name))
    }

    /// Project this value onto a hashable key.
    ///
    /// Returns `None` for values that cannot identify a group: nulls, floats,
    /// lists and objects.
    pub fn group_key(&self) -> Option<GroupKey> {
        match self {
            Self::Bool(v) => Some(GroupKey::Bool(*v)),
            Self::Int(v) => Some(GroupKey::Int(*v)),
            Self::String(v) => Some(GroupKey::String(SmolStr::new(v))),
            _ => None,
        }
    }

    /// Total order used for sorting; values of different kinds order by kind.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::List(_) => 4,
            Self::Object(_) => 5,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Self::List(values) => {
                let parts: Vec<_> = values.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
            Self::Object(row) => {
                let parts: Vec<_> = row.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Row> for Value {
    fn from(v: Row) -> Self {
        Self::Object(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(row) => serde_json::Value::Object(
                row.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

/// Distinct groupable values in first-seen order.
///
/// Values without a [`GroupKey`] (nulls, floats, lists, objects) are skipped.
pub fn distinct_keys<'v>(values: impl IntoIterator<Item = &'v Value>) -> Vec<Value> {
    let keys: IndexSet<GroupKey> = values.into_iter().filter_map(Value::group_key).collect();
    keys.into_iter().map(Value::from).collect()
}

/// Hashable projection of a [`Value`], used for identity lookups and grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// Boolean key.
    Bool(bool),
    /// Integer key.
    Int(i64),
    /// String key.
    String(SmolStr),
}

impl From<GroupKey> for Value {
    fn from(key: GroupKey) -> Self {
        match key {
            GroupKey::Bool(v) => Value::Bool(v),
            GroupKey::Int(v) => Value::Int(v),
            GroupKey::String(v) => Value::String(v.to_string()),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_keys_keep_first_seen_order() {
        let values = [
            Value::Int(3),
            Value::Null,
            Value::from("a"),
            Value::Int(3),
            Value::Float(1.5),
            Value::Int(1),
            Value::from("a"),
        ];
        assert_eq!(
            distinct_keys(&values),
            vec![Value::Int(3), Value::from("a"), Value::Int(1)]
        );
    }

    #[test]
    fn test_distinct_keys_large_input() {
        let values: Vec<Value> = (0..200_000).map(|i| Value::Int(i % 100_000)).collect();
        let keys = distinct_keys(&values);
        assert_eq!(keys.len(), 100_000);
        assert_eq!(keys.first(), Some(&Value::Int(0)));
        assert_eq!(keys.last(), Some(&Value::Int(99_999)));
    }

    #[test]
    fn test_group_key_projection() {
        assert_eq!(Value::Int(7).group_key(), Some(GroupKey::Int(7)));
        assert_eq!(
            Value::from("abc").group_key(),
            Some(GroupKey::String("abc".into()))
        );
        assert_eq!(Value::Null.group_key(), None);
        assert_eq!(Value::Float(1.5).group_key(), None);
    }

    #[test]
    fn test_display_quotes_strings() {
        assert_eq!(Value::from("O'Hara").to_string(), "'O''Hara'");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "(1, 2)");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_sort_cmp_mixed_numbers() {
        assert_eq!(Value::Int(2).sort_cmp(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(Value::Null.sort_cmp(&Value::Int(0)), Ordering::Less);
    }

    #[test]
    fn test_serializes_untagged() {
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(1));
        row.insert("tags".into(), Value::from(vec!["a", "b"]));
        row.insert("parent".into(), Value::Null);

        let json = serde_json::to_value(Value::Object(row)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "tags": ["a", "b"], "parent": null})
        );
    }

    #[test]
    fn test_json_conversion() {
        let value = Value::from(serde_json::json!({"a": [1, "x", null]}));
        assert_eq!(
            value.field("a"),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::from("x"),
                Value::Null
            ]))
        );
        let back: serde_json::Value = value.into();
        assert_eq!(back, serde_json::json!({"a": [1, "x", null]}));
    }
}
