//! Turning backend records into select options.
//!
//! Loaders usually receive plain JSON records (`{"id": 3, "name": "…",
//! "province_id": 7}`). [`format_options`] maps them onto [`XSelectOption`]s,
//! including the parent link used for reachability.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::option::{ParentLink, XSelectOption};
use crate::value::{FieldValue, OptionValue};

/// Where a record keeps its parent reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentKey {
    /// One record key holding a scalar or array of parent values.
    Single(String),
    /// Parent field name → record key, for multi-parent options.
    ByField(BTreeMap<String, String>),
}

/// Record keys used by [`format_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionFormat {
    pub label_key: String,
    pub value_key: String,
    pub parent_key: Option<ParentKey>,
}

impl Default for OptionFormat {
    fn default() -> Self {
        Self::new("name", "id")
    }
}

impl OptionFormat {
    #[must_use]
    pub fn new(label_key: impl Into<String>, value_key: impl Into<String>) -> Self {
        Self {
            label_key: label_key.into(),
            value_key: value_key.into(),
            parent_key: None,
        }
    }

    #[must_use]
    pub fn parent_key(mut self, key: impl Into<String>) -> Self {
        self.parent_key = Some(ParentKey::Single(key.into()));
        self
    }

    /// Map `record_key` onto parent field `field`. Chain for several parents.
    #[must_use]
    pub fn parent_field(mut self, field: impl Into<String>, record_key: impl Into<String>) -> Self {
        let mut map = match self.parent_key.take() {
            Some(ParentKey::ByField(map)) => map,
            _ => BTreeMap::new(),
        };
        map.insert(field.into(), record_key.into());
        self.parent_key = Some(ParentKey::ByField(map));
        self
    }
}

fn scalar(value: &Value) -> Option<OptionValue> {
    match value {
        Value::Number(n) => n.as_i64().map(OptionValue::Int),
        Value::String(s) => Some(OptionValue::Str(s.clone())),
        _ => None,
    }
}

fn field_value(value: Option<&Value>) -> Option<FieldValue> {
    match value? {
        Value::Null => None,
        Value::Array(items) => Some(FieldValue::Many(items.iter().filter_map(scalar).collect())),
        other => scalar(other).map(FieldValue::One),
    }
}

fn label(value: Option<&Value>, fallback: &OptionValue) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// Convert backend records into options. Records that are not objects, or
/// whose value is missing or not a string/integer, are skipped.
#[must_use]
pub fn format_options(records: &[Value], format: &OptionFormat) -> Vec<XSelectOption> {
    let mut skipped = 0usize;
    let out: Vec<XSelectOption> = records
        .iter()
        .filter_map(|record| {
            let Some(obj) = record.as_object() else {
                skipped += 1;
                return None;
            };
            let Some(value) = obj.get(&format.value_key).and_then(scalar) else {
                skipped += 1;
                return None;
            };
            let parent_value = match &format.parent_key {
                None => None,
                Some(ParentKey::Single(key)) => field_value(obj.get(key)).map(ParentLink::Values),
                Some(ParentKey::ByField(keys)) => {
                    let map: BTreeMap<String, FieldValue> = keys
                        .iter()
                        .filter_map(|(field, key)| {
                            field_value(obj.get(key)).map(|v| (field.clone(), v))
                        })
                        .collect();
                    (!map.is_empty()).then_some(ParentLink::ByField(map))
                }
            };
            Some(XSelectOption {
                label: label(obj.get(&format.label_key), &value),
                value,
                parent_value,
            })
        })
        .collect();
    if skipped > 0 {
        tracing::debug!(skipped, kept = out.len(), "format_options skipped unusable records");
    }
    out
}
