//! Option reachability.
//!
//! One rule decides both which options a dependent field offers and which of
//! its selections survive a parent change:
//!
//! - an option without a [`ParentLink`] is always reachable;
//! - under a single parent, an option is reachable when any value it links to
//!   is currently selected in that parent;
//! - under several parents, a [`ParentLink::ByField`] option is reachable only
//!   when **every** parent it names still holds one of its linked values; a
//!   [`ParentLink::Values`] option only needs one match across all parents.

use std::collections::BTreeMap;

use ahash::AHashSet;

use crate::config::DependsOn;
use crate::option::{ParentLink, XSelectOption};
use crate::value::{FieldValue, FieldValues, OptionValue, ParentSnapshot};

/// Selected keys of one parent field.
pub type KeySet = AHashSet<OptionValue>;

/// Selected keys of each parent of a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentSets {
    sets: BTreeMap<String, KeySet>,
    multi: bool,
}

fn key_set(value: &FieldValue) -> KeySet {
    value.keys().cloned().collect()
}

impl ParentSets {
    /// Collect the parents' current keys from `values`.
    #[must_use]
    pub fn resolve(depends_on: &DependsOn, values: &FieldValues) -> Self {
        Self {
            sets: depends_on
                .parents()
                .iter()
                .map(|p| (p.clone(), key_set(values.get(p))))
                .collect(),
            multi: depends_on.is_multi(),
        }
    }

    /// Rebuild from an already-resolved snapshot.
    #[must_use]
    pub fn from_snapshot(depends_on: &DependsOn, snapshot: &ParentSnapshot) -> Self {
        let sets = match (depends_on, snapshot) {
            (DependsOn::SingleParent(p), ParentSnapshot::Single(v)) => {
                std::iter::once((p.clone(), key_set(v))).collect()
            }
            (_, ParentSnapshot::Multi(map)) => {
                map.iter().map(|(k, v)| (k.clone(), key_set(v))).collect()
            }
            _ => BTreeMap::new(),
        };
        Self {
            sets,
            multi: depends_on.is_multi(),
        }
    }

    /// Build directly from per-parent key sets. More than one entry means
    /// multi-parent rules apply.
    #[must_use]
    pub fn from_sets(sets: BTreeMap<String, KeySet>) -> Self {
        let multi = sets.len() > 1;
        Self { sets, multi }
    }

    #[must_use]
    pub fn get(&self, parent: &str) -> Option<&KeySet> {
        self.sets.get(parent)
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// True when no parent holds any key.
    #[must_use]
    pub fn all_empty(&self) -> bool {
        self.sets.values().all(|set| set.is_empty())
    }

    fn any_contains(&self, key: &OptionValue) -> bool {
        self.sets.values().any(|set| set.contains(key))
    }
}

/// Single-parent rule: some linked value is in `parent`.
#[must_use]
pub fn link_reaches(link: &ParentLink, parent: &KeySet) -> bool {
    link.values().any(|k| parent.contains(k))
}

/// Multi-parent rule: conjunction across named parents for keyed links,
/// any match for plain value links.
#[must_use]
pub fn link_reaches_all(link: &ParentLink, parents: &ParentSets) -> bool {
    match link {
        ParentLink::ByField(by_field) => by_field.iter().all(|(field, linked)| {
            parents
                .get(field)
                .is_some_and(|set| linked.keys().any(|k| set.contains(k)))
        }),
        ParentLink::Values(linked) => linked.keys().any(|k| parents.any_contains(k)),
    }
}

/// Whether `option` is offered under the given parent selection.
#[must_use]
pub fn is_reachable(option: &XSelectOption, parents: &ParentSets) -> bool {
    let Some(link) = &option.parent_value else {
        return true;
    };
    if parents.is_multi() {
        return link_reaches_all(link, parents);
    }
    match parents.sets.values().next() {
        Some(set) => link_reaches(link, set),
        None => false,
    }
}

/// Options reachable from a single parent's keys.
#[must_use]
pub fn filter_options_by_parent(options: &[XSelectOption], parent: &KeySet) -> Vec<XSelectOption> {
    options
        .iter()
        .filter(|o| o.parent_value.as_ref().is_none_or(|l| link_reaches(l, parent)))
        .cloned()
        .collect()
}

/// Options reachable from the given parents' keys.
#[must_use]
pub fn filter_options_by_parents(
    options: &[XSelectOption],
    parents: &ParentSets,
) -> Vec<XSelectOption> {
    options
        .iter()
        .filter(|o| is_reachable(o, parents))
        .cloned()
        .collect()
}
