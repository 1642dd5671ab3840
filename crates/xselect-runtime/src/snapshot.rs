//! Per-field memoized snapshots for pull-based subscribers.
//!
//! A subscriber pairs [`Store::subscribe`] with [`Store::get_field_snapshot`]
//! and re-renders only when the returned `Rc` changes identity. The cache
//! makes that cheap: an unchanged store version returns the cached snapshot
//! without recomputation, and a changed version only allocates a new snapshot
//! when the field's value, parent value, or loading flag actually differ.
//!
//! [`Store::subscribe`]: crate::store::Store::subscribe
//! [`Store::get_field_snapshot`]: crate::store::Store::get_field_snapshot

use std::rc::Rc;

use ahash::AHashMap;
use xselect_core::{FieldValue, ParentSnapshot};

/// Observable state of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub value: FieldValue,
    /// The single parent's value, or an object keyed by parent name.
    pub parent_value: ParentSnapshot,
    /// Parent values in declaration order, for multi-parent fields.
    pub parent_values: Option<Vec<FieldValue>>,
    pub is_loading: bool,
}

impl FieldSnapshot {
    fn same_state(&self, value: &FieldValue, parent: &ParentSnapshot, is_loading: bool) -> bool {
        self.is_loading == is_loading && &self.value == value && &self.parent_value == parent
    }
}

struct Cached {
    version: u64,
    snapshot: Rc<FieldSnapshot>,
}

#[derive(Default)]
pub(crate) struct SnapshotCache {
    entries: AHashMap<String, Cached>,
    inert: Rc<FieldSnapshot>,
}

impl SnapshotCache {
    /// The cached snapshot for `field` if it is current for `version`.
    pub(crate) fn current(&self, field: &str, version: u64) -> Option<Rc<FieldSnapshot>> {
        self.entries
            .get(field)
            .filter(|c| c.version == version)
            .map(|c| Rc::clone(&c.snapshot))
    }

    /// Record the state computed at `version`, reusing the previous snapshot
    /// when nothing observable changed.
    pub(crate) fn refresh(
        &mut self,
        field: &str,
        version: u64,
        value: FieldValue,
        parent_value: ParentSnapshot,
        parent_values: Option<Vec<FieldValue>>,
        is_loading: bool,
    ) -> Rc<FieldSnapshot> {
        if let Some(cached) = self.entries.get_mut(field)
            && cached.snapshot.same_state(&value, &parent_value, is_loading)
        {
            cached.version = version;
            return Rc::clone(&cached.snapshot);
        }
        let snapshot = Rc::new(FieldSnapshot {
            value,
            parent_value,
            parent_values,
            is_loading,
        });
        self.entries.insert(
            field.to_owned(),
            Cached {
                version,
                snapshot: Rc::clone(&snapshot),
            },
        );
        snapshot
    }

    /// Shared empty snapshot handed out for undeclared fields.
    pub(crate) fn inert(&self) -> Rc<FieldSnapshot> {
        Rc::clone(&self.inert)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_state_keeps_identity_across_versions() {
        let mut cache = SnapshotCache::default();
        let a = cache.refresh("city", 1, "D1".into(), ParentSnapshot::None, None, false);
        let b = cache.refresh("city", 2, "D1".into(), ParentSnapshot::None, None, false);
        assert!(Rc::ptr_eq(&a, &b));
        assert!(cache.current("city", 2).is_some());
        assert!(cache.current("city", 1).is_none());
    }

    #[test]
    fn loading_flag_change_allocates() {
        let mut cache = SnapshotCache::default();
        let a = cache.refresh("city", 1, FieldValue::Empty, ParentSnapshot::None, None, false);
        let b = cache.refresh("city", 2, FieldValue::Empty, ParentSnapshot::None, None, true);
        assert!(!Rc::ptr_eq(&a, &b));
        assert!(b.is_loading);
    }

    #[test]
    fn parent_change_compares_by_content() {
        let mut cache = SnapshotCache::default();
        let parent = ParentSnapshot::Single(FieldValue::many(["HCM", "HN"]));
        let a = cache.refresh("city", 1, FieldValue::Empty, parent.clone(), None, false);
        let b = cache.refresh("city", 2, FieldValue::Empty, parent, None, false);
        assert!(Rc::ptr_eq(&a, &b));
        let c = cache.refresh(
            "city",
            3,
            FieldValue::Empty,
            ParentSnapshot::Single(FieldValue::many(["HN"])),
            None,
            false,
        );
        assert!(!Rc::ptr_eq(&b, &c));
    }
}
