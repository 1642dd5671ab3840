//! Field-keyed listener registry and the pending-notification batch.
//!
//! # Design
//!
//! Listeners are stored per field name. Mutations never call them directly;
//! they add field names to a [`PendingBatch`]. The first addition after a
//! flush asks the store to schedule one, later additions coalesce into it.
//! A flush reads the registry at flush time, so listeners added after the
//! flush was scheduled still hear about it.
//!
//! # Invariants
//!
//! 1. A field appears in a batch at most once.
//! 2. Listener ids are never reused within one registry.
//! 3. Dropping a [`Subscription`] removes its listener; a dropped store makes
//!    the guard inert.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::store::StoreInner;

pub(crate) type Listener = Rc<dyn Fn()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    by_field: AHashMap<String, Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, field: &str, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.by_field
            .entry(field.to_owned())
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, field: &str, id: ListenerId) {
        if let Some(list) = self.by_field.get_mut(field) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                self.by_field.remove(field);
            }
        }
    }

    /// Clones of the listeners for `field`, in registration order.
    pub(crate) fn listeners(&self, field: &str) -> Vec<Listener> {
        self.by_field
            .get(field)
            .map(|list| list.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn count(&self, field: &str) -> usize {
        self.by_field.get(field).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&mut self) {
        self.by_field.clear();
    }
}

/// Fields waiting for the next flush.
#[derive(Debug, Default)]
pub(crate) struct PendingBatch {
    fields: BTreeSet<String>,
    scheduled: bool,
}

impl PendingBatch {
    /// Add `fields`. Returns true when the caller must schedule a flush.
    pub(crate) fn extend<I>(&mut self, fields: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        self.fields.extend(fields);
        if self.scheduled || self.fields.is_empty() {
            return false;
        }
        self.scheduled = true;
        true
    }

    /// Take the batch and mark the store idle.
    pub(crate) fn drain(&mut self) -> BTreeSet<String> {
        self.scheduled = false;
        std::mem::take(&mut self.fields)
    }

    /// Forget that a flush was scheduled; the fields stay pending.
    pub(crate) fn unschedule(&mut self) {
        self.scheduled = false;
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
        self.scheduled = false;
    }

    #[cfg(test)]
    pub(crate) fn is_scheduled(&self) -> bool {
        self.scheduled
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    field: String,
    id: ListenerId,
}

impl Subscription {
    pub(crate) fn new(store: Weak<StoreInner>, field: String, id: ListenerId) -> Self {
        Self { store, field, id }
    }

    /// The field this subscription listens to.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(&self.field, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("field", &self.field)
            .field("id", &self.id.0)
            .field("live", &(self.store.strong_count() > 0))
            .finish()
    }
}
