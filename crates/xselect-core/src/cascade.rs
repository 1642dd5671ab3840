//! Cascade delete: dropping selections a parent change made unreachable.
//!
//! [`cascade_delete`] and [`cascade_delete_multi_parent`] prune one field's
//! value against its options, and [`prune_to_parents`] does the same for a
//! value written directly to a dependent field. [`cascade_descendants`] runs the pass over every
//! transitive dependent of a set of changed fields, in breadth-first order,
//! against one working copy of the values.
//!
//! # Invariants
//!
//! 1. An option without a parent link never invalidates a selection.
//! 2. A selected key with no matching option is kept.
//! 3. Array values keep the relative order of surviving keys.
//! 4. A dependent whose parents are all empty ends up cleared.
//! 5. A directly written dependent value is pruned against its current
//!    parents, so a commit never stores an unreachable selection.
//! 6. A dependent is only re-evaluated when one of its parents differs from
//!    the pre-change values.

pub use crate::filter::{KeySet, ParentSets};

use crate::config::{FieldConfig, FieldConfigs};
use crate::filter::{link_reaches, link_reaches_all};
use crate::option::{OptionSet, XSelectOption};
use crate::value::{FieldValue, FieldValues, OptionValue, ParentSnapshot};

fn retain(
    current: &FieldValue,
    options: &OptionSet,
    valid: impl Fn(&XSelectOption) -> bool,
) -> FieldValue {
    if current.is_empty() {
        return current.clone();
    }
    let keep = |v: &OptionValue| options.get(v).is_none_or(|opt| valid(opt));
    match current {
        FieldValue::Empty => FieldValue::Empty,
        FieldValue::One(v) => {
            if keep(v) {
                current.clone()
            } else {
                FieldValue::Empty
            }
        }
        FieldValue::Many(vs) => FieldValue::Many(vs.iter().filter(|v| keep(*v)).cloned().collect()),
    }
}

/// Prune `current` to the options still reachable from a single parent's
/// remaining keys.
#[must_use]
pub fn cascade_delete(current: &FieldValue, remaining: &KeySet, options: &OptionSet) -> FieldValue {
    retain(current, options, |opt| {
        opt.parent_value
            .as_ref()
            .is_none_or(|link| link_reaches(link, remaining))
    })
}

/// Prune `current` for a field with several parents. Options keyed by parent
/// field must stay reachable through every parent they name.
#[must_use]
pub fn cascade_delete_multi_parent(
    current: &FieldValue,
    remaining: &ParentSets,
    options: &OptionSet,
) -> FieldValue {
    retain(current, options, |opt| {
        opt.parent_value
            .as_ref()
            .is_none_or(|link| link_reaches_all(link, remaining))
    })
}

fn prune_by_links(
    config: &FieldConfig,
    current: &FieldValue,
    values: &FieldValues,
    options: &OptionSet,
) -> FieldValue {
    let sets = ParentSets::resolve(&config.depends_on, values);
    if sets.is_multi() {
        return cascade_delete_multi_parent(current, &sets, options);
    }
    let single = config
        .depends_on
        .parents()
        .first()
        .and_then(|p| sets.get(p))
        .cloned()
        .unwrap_or_default();
    cascade_delete(current, &single, options)
}

/// Prune the value `values` holds for `config` against that field's own
/// parents in `values`.
///
/// A dependent field whose parents are all empty is cleared. Otherwise keys
/// whose option is no longer reachable are dropped; options without parent
/// links leave the value as is. Root fields are returned unchanged.
#[must_use]
pub fn prune_to_parents(
    config: &FieldConfig,
    values: &FieldValues,
    options: &OptionSet,
) -> FieldValue {
    let current = values.get(&config.name);
    if config.depends_on.is_root() || current.is_empty() {
        return current.clone();
    }
    if ParentSnapshot::resolve(&config.depends_on, values).all_empty() {
        return FieldValue::cleared(config.mode);
    }
    if !options.has_parent_links() {
        return current.clone();
    }
    prune_by_links(config, current, values, options)
}

/// Apply cascade delete for every descendant of `changed`.
///
/// `before` holds the values prior to this mutation; `working` already holds
/// the direct changes and receives every cascaded change. `resolve_options`
/// supplies the option list used to judge a descendant's current selection.
/// Returns the names of descendants whose value changed, first change first.
pub fn cascade_descendants<'a>(
    configs: &FieldConfigs,
    changed: impl IntoIterator<Item = &'a str>,
    before: &FieldValues,
    working: &mut FieldValues,
    mut resolve_options: impl FnMut(&FieldConfig) -> OptionSet,
) -> Vec<String> {
    let relationships = configs.relationships();
    let mut cascaded: Vec<String> = Vec::new();

    for field in changed {
        for descendant in relationships.descendants(field) {
            let Some(config) = configs.get(descendant) else {
                continue;
            };
            let current = working.get(descendant);
            if current.is_empty() {
                continue;
            }
            let parents = config.depends_on.parents();
            if parents.iter().all(|p| before.get(p) == working.get(p)) {
                continue;
            }

            let next = if parents.iter().all(|p| working.get(p).is_empty()) {
                FieldValue::cleared(config.mode)
            } else {
                let options = resolve_options(config);
                if options.has_parent_links() {
                    prune_by_links(config, current, working, &options)
                } else {
                    FieldValue::cleared(config.mode)
                }
            };

            if &next != working.get(descendant) {
                working.set(descendant.clone(), next);
                if !cascaded.iter().any(|c| c == descendant) {
                    cascaded.push(descendant.clone());
                }
            }
        }
    }
    cascaded
}
