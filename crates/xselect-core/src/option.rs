//! Selectable options and identity-tagged option lists.
//!
//! An option may declare a [`ParentLink`]: the parent value(s) under which it
//! is reachable. Options without one are reachable under any parent.
//!
//! [`OptionSet`] gives every list a process-unique [`OptionSetId`] at creation
//! so caches can key off the list's identity instead of comparing contents.
//! The value index and the "carries parent links" flag are computed at most
//! once per set.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{FieldValue, OptionValue};

/// Which parent value(s) make an option reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentLink {
    /// Keyed by parent field name, for fields with several parents. The option
    /// stays reachable only while every listed parent still holds one of the
    /// listed values.
    ByField(BTreeMap<String, FieldValue>),
    /// A scalar or list of parent values; any one of them is enough.
    Values(FieldValue),
}

impl ParentLink {
    /// Every parent key named by this link, flattened across parent fields.
    pub fn values(&self) -> Box<dyn Iterator<Item = &OptionValue> + '_> {
        match self {
            Self::ByField(map) => Box::new(map.values().flat_map(FieldValue::keys)),
            Self::Values(v) => Box::new(v.keys()),
        }
    }
}

/// One entry of a select control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XSelectOption {
    pub label: String,
    pub value: OptionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_value: Option<ParentLink>,
}

impl XSelectOption {
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            parent_value: None,
        }
    }

    /// Reachable while the (single) parent holds any of `parent`.
    #[must_use]
    pub fn under(mut self, parent: impl Into<FieldValue>) -> Self {
        self.parent_value = Some(ParentLink::Values(parent.into()));
        self
    }

    /// Reachable while parent field `field` holds any of `parent`. Chain calls
    /// to tie the option to several parents.
    #[must_use]
    pub fn under_field(mut self, field: impl Into<String>, parent: impl Into<FieldValue>) -> Self {
        let mut map = match self.parent_value.take() {
            Some(ParentLink::ByField(map)) => map,
            _ => BTreeMap::new(),
        };
        map.insert(field.into(), parent.into());
        self.parent_value = Some(ParentLink::ByField(map));
        self
    }
}

// ─── OptionSet identity ──────────────────────────────────────────────────────

static NEXT_OPTION_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an [`OptionSet`], assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionSetId(u64);

impl OptionSetId {
    fn next() -> Self {
        Self(NEXT_OPTION_SET_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

struct OptionSetInner {
    id: OptionSetId,
    options: Vec<XSelectOption>,
    index: OnceCell<AHashMap<OptionValue, usize>>,
    has_links: OnceCell<bool>,
}

/// An immutable, cheaply cloneable option list.
///
/// Clones share storage and identity.
#[derive(Clone)]
pub struct OptionSet {
    inner: Rc<OptionSetInner>,
}

impl OptionSet {
    #[must_use]
    pub fn new(options: Vec<XSelectOption>) -> Self {
        Self {
            inner: Rc::new(OptionSetInner {
                id: OptionSetId::next(),
                options,
                index: OnceCell::new(),
                has_links: OnceCell::new(),
            }),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[must_use]
    pub fn id(&self) -> OptionSetId {
        self.inner.id
    }

    #[must_use]
    pub fn as_slice(&self) -> &[XSelectOption] {
        &self.inner.options
    }

    /// Value → option lookup, built on first use. Later duplicates win.
    #[must_use]
    pub fn index(&self) -> &AHashMap<OptionValue, usize> {
        self.inner.index.get_or_init(|| {
            self.inner
                .options
                .iter()
                .enumerate()
                .map(|(i, o)| (o.value.clone(), i))
                .collect()
        })
    }

    /// The option whose value is `value`, if present.
    #[must_use]
    pub fn get(&self, value: &OptionValue) -> Option<&XSelectOption> {
        self.index().get(value).map(|&i| &self.inner.options[i])
    }

    /// Whether any option declares a [`ParentLink`].
    #[must_use]
    pub fn has_parent_links(&self) -> bool {
        *self
            .inner
            .has_links
            .get_or_init(|| self.inner.options.iter().any(|o| o.parent_value.is_some()))
    }

    /// Same identity (clones of one set).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Same options by `value` and `parent_value`, in order. Labels are
    /// ignored.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.value == b.value && a.parent_value == b.parent_value)
    }
}

impl Deref for OptionSet {
    type Target = [XSelectOption];

    fn deref(&self) -> &Self::Target {
        &self.inner.options
    }
}

impl Default for OptionSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionSet")
            .field("id", &self.inner.id.0)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl From<Vec<XSelectOption>> for OptionSet {
    fn from(options: Vec<XSelectOption>) -> Self {
        Self::new(options)
    }
}

impl FromIterator<XSelectOption> for OptionSet {
    fn from_iter<I: IntoIterator<Item = XSelectOption>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for OptionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.options.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OptionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<XSelectOption>::deserialize(deserializer).map(Self::new)
    }
}
