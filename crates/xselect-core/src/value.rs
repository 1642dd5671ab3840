//! Field values and the parent-value projection derived from them.
//!
//! # Invariants
//!
//! 1. Value equality is structural; arrays compare element-by-element in order.
//! 2. [`FieldValue::Empty`] and an empty [`FieldValue::Many`] are both *empty*
//!    but are not equal to each other.
//! 3. Reading a field that is absent from [`FieldValues`] yields
//!    [`FieldValue::Empty`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{DependsOn, SelectMode};

/// A selectable key: the `value` of an option, or one element of a field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Str(String),
}

impl OptionValue {
    /// Whether this key counts as "no selection" (the empty string).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Str(s) if s.is_empty())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for OptionValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// The value held by one field: nothing, a single key, or a list of keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Empty,
    One(OptionValue),
    Many(Vec<OptionValue>),
}

impl FieldValue {
    /// Build a multi-select value from anything convertible to keys.
    pub fn many<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OptionValue>,
    {
        Self::Many(items.into_iter().map(Into::into).collect())
    }

    /// The cleared value for a field of the given selection mode.
    #[must_use]
    pub fn cleared(mode: SelectMode) -> Self {
        match mode {
            SelectMode::Single => Self::Empty,
            SelectMode::Multiple => Self::Many(Vec::new()),
        }
    }

    /// `Empty`, an empty list, or a blank string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::One(v) => v.is_blank(),
            Self::Many(vs) => vs.is_empty(),
        }
    }

    /// The selected keys as a slice (empty for `Empty`).
    #[must_use]
    pub fn as_slice(&self) -> &[OptionValue] {
        match self {
            Self::Empty => &[],
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(vs) => vs,
        }
    }

    /// Iterate over the non-blank selected keys.
    pub fn keys(&self) -> impl Iterator<Item = &OptionValue> {
        self.as_slice().iter().filter(|v| !v.is_blank())
    }
}

impl From<OptionValue> for FieldValue {
    fn from(v: OptionValue) -> Self {
        Self::One(v)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::One(n.into())
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::One(n.into())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::One(s.into())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::One(s.into())
    }
}

impl<T: Into<OptionValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::many(items)
    }
}

static EMPTY: FieldValue = FieldValue::Empty;

/// Mapping from field name to its current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValues(BTreeMap<String, FieldValue>);

impl FieldValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `field`, or `Empty` when the field was never set.
    #[must_use]
    pub fn get(&self, field: &str) -> &FieldValue {
        self.0.get(field).unwrap_or(&EMPTY)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Store `value` under `field`, returning the previous value if any.
    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(field.into(), value)
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The current value(s) of a field's parents, as seen by that field.
///
/// Serializes to `null`, the single parent's value, or an object keyed by
/// parent field name. That serialized form is the async request key suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParentSnapshot {
    #[default]
    None,
    Single(FieldValue),
    Multi(BTreeMap<String, FieldValue>),
}

impl ParentSnapshot {
    /// Project `values` through a field's normalized dependency.
    #[must_use]
    pub fn resolve(depends_on: &DependsOn, values: &FieldValues) -> Self {
        match depends_on {
            DependsOn::NoParent => Self::None,
            DependsOn::SingleParent(parent) => Self::Single(values.get(parent).clone()),
            DependsOn::MultiParent(parents) => Self::Multi(
                parents
                    .iter()
                    .map(|p| (p.clone(), values.get(p).clone()))
                    .collect(),
            ),
        }
    }

    /// True when every parent is empty. A root field never is.
    #[must_use]
    pub fn all_empty(&self) -> bool {
        match self {
            Self::None => false,
            Self::Single(v) => v.is_empty(),
            Self::Multi(map) => map.values().all(FieldValue::is_empty),
        }
    }

    /// A field's parent dependency is satisfied when at least one parent holds
    /// a value (always, for root fields).
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        !self.all_empty()
    }

    /// Stable serialized form used in async request keys.
    #[must_use]
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("null"))
    }
}
