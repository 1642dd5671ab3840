//! The cascading-field store.
//!
//! # Commit flow
//!
//! Every value mutation follows the same steps:
//!
//! 1. Diff the requested values against the current map. No difference means
//!    no work at all.
//! 2. Apply the direct changes to a working copy, prune each of them against
//!    its own parents in that copy, then run cascade delete over every
//!    descendant of the changed fields.
//! 3. Commit the copy, start option loads that the new parent values call
//!    for, and bump the version once.
//! 4. Queue a notification for each changed field and its direct children.
//! 5. Push the committed values through the [`FormAdapter`].
//!
//! # Failure Modes
//!
//! - Undeclared field names are ignored (with a one-time warning) and read as
//!   an inert empty snapshot.
//! - Without a spawner, notifications wait for [`Store::flush_notifications`]
//!   and loads only progress while someone awaits [`Store::load_options`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use tracing::{debug, trace, warn};
use xselect_core::{
    FieldConfig, FieldConfigs, FieldValue, FieldValues, OptionSet, OptionSetId, OptionsSource,
    ParentSets, ParentSnapshot, VersionedCache, cascade_descendants, filter_options_by_parents,
    prune_to_parents,
};

use crate::adapter::{FieldChange, FormAdapter, push_changes};
use crate::binding::FieldBinding;
use crate::loader::{LoadState, SharedLoad, load_task, request_key};
use crate::notify::{ListenerId, ListenerRegistry, PendingBatch, Subscription};
use crate::options::StoreOptions;
use crate::snapshot::{FieldSnapshot, SnapshotCache};

type FilterStamp = (u64, OptionSetId, String);

pub(crate) struct StoreInner {
    configs: FieldConfigs,
    options: StoreOptions,
    adapter: Option<Rc<dyn FormAdapter>>,
    spawner: Option<Rc<dyn LocalSpawn>>,
    values: RefCell<Rc<FieldValues>>,
    version: Cell<u64>,
    destroyed: Cell<bool>,
    listeners: RefCell<ListenerRegistry>,
    pending: RefCell<PendingBatch>,
    snapshots: RefCell<SnapshotCache>,
    external: RefCell<AHashMap<String, OptionSet>>,
    filtered: RefCell<VersionedCache<String, OptionSet, FilterStamp>>,
    loads: RefCell<LoadState>,
    warned: RefCell<AHashSet<String>>,
}

/// Shared handle to one form session's field state.
///
/// Cloning is cheap and every clone refers to the same store.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

// ─── Construction ────────────────────────────────────────────────────────────

/// Builder for [`Store`].
#[must_use]
pub struct StoreBuilder {
    configs: FieldConfigs,
    initial: FieldValues,
    adapter: Option<Rc<dyn FormAdapter>>,
    spawner: Option<Rc<dyn LocalSpawn>>,
    options: StoreOptions,
}

impl StoreBuilder {
    pub fn initial_values(mut self, values: FieldValues) -> Self {
        self.initial = values;
        self
    }

    pub fn adapter(mut self, adapter: impl FormAdapter + 'static) -> Self {
        self.adapter = Some(Rc::new(adapter));
        self
    }

    pub fn options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Executor used for notification flushes and option loads.
    pub fn spawner(mut self, spawner: impl LocalSpawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }

    pub fn build(self) -> Store {
        let mut values = self.initial;
        if self.options.normalize_initial_values {
            normalize(&self.configs, &mut values);
        }
        let store = Store {
            inner: Rc::new(StoreInner {
                configs: self.configs,
                options: self.options,
                adapter: self.adapter,
                spawner: self.spawner,
                values: RefCell::new(Rc::new(values)),
                version: Cell::new(0),
                destroyed: Cell::new(false),
                listeners: RefCell::new(ListenerRegistry::default()),
                pending: RefCell::new(PendingBatch::default()),
                snapshots: RefCell::new(SnapshotCache::default()),
                external: RefCell::new(AHashMap::new()),
                filtered: RefCell::new(VersionedCache::new()),
                loads: RefCell::new(LoadState::default()),
                warned: RefCell::new(AHashSet::new()),
            }),
        };
        if store.inner.options.eager_load {
            let async_fields: Vec<String> = store
                .inner
                .configs
                .iter()
                .filter(|c| c.is_async())
                .map(|c| c.name.clone())
                .collect();
            for field in &async_fields {
                store.inner.ensure_loaded(field);
            }
        }
        debug!(
            fields = store.inner.configs.len(),
            "cascading-field store created"
        );
        store
    }
}

/// Clear every field whose parents are all empty, repeating until stable so
/// that grandchildren of cleared fields are cleared too.
fn normalize(configs: &FieldConfigs, values: &mut FieldValues) {
    loop {
        let mut changed = false;
        for config in configs.iter() {
            if config.depends_on.is_root() || values.get(&config.name).is_empty() {
                continue;
            }
            let parent = ParentSnapshot::resolve(&config.depends_on, values);
            if parent.all_empty() {
                values.set(config.name.clone(), FieldValue::cleared(config.mode));
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

impl Store {
    /// Start building a store for `configs`.
    pub fn builder(configs: FieldConfigs) -> StoreBuilder {
        StoreBuilder {
            configs,
            initial: FieldValues::new(),
            adapter: None,
            spawner: None,
            options: StoreOptions::default(),
        }
    }

    /// A store with default options, no adapter and no spawner.
    #[must_use]
    pub fn new(configs: FieldConfigs, initial: FieldValues) -> Self {
        Self::builder(configs).initial_values(initial).build()
    }

    // ─── Mutation ────────────────────────────────────────────────────────────

    /// Set one field, cascading to its dependents.
    ///
    /// A dependent field is held to its parents as they stand: it is cleared
    /// when they are all empty, and keys whose options they no longer reach
    /// are dropped.
    pub fn set_value(&self, field: &str, value: impl Into<FieldValue>) {
        self.inner.apply(vec![(field.to_owned(), value.into())]);
    }

    /// Set several fields in one commit.
    pub fn set_values<I, K, V>(&self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.inner.apply(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
    }

    /// Adopt values from an external source of truth.
    ///
    /// Changed fields are republished to subscribers. Cascade delete does not
    /// run and the adapter is not called back.
    pub fn sync_controlled_value(&self, values: &FieldValues) {
        self.inner.sync_controlled(values);
    }

    /// Replace the option list of `field` with one supplied by the caller.
    pub fn set_external_options(&self, field: &str, options: impl Into<OptionSet>) {
        self.inner.set_external_options(field, options.into());
    }

    // ─── Reads ───────────────────────────────────────────────────────────────

    /// The memoized snapshot of `field`.
    ///
    /// Returns the same `Rc` until the field's value, parent value or loading
    /// flag changes.
    #[must_use]
    pub fn get_field_snapshot(&self, field: &str) -> Rc<FieldSnapshot> {
        self.inner.snapshot(field)
    }

    /// Options currently offered by `field`, filtered by its parent value.
    ///
    /// `external` takes precedence over every other option source.
    #[must_use]
    pub fn get_options(&self, field: &str, external: Option<&OptionSet>) -> OptionSet {
        self.inner.options_for(field, external)
    }

    /// Await the options of an async field for its current parent value.
    ///
    /// Concurrent calls for the same parent value share one loader call.
    /// Returns `None` for undeclared or static fields, for fields whose
    /// parents are all empty, and after [`destroy`](Self::destroy).
    #[must_use]
    pub fn load_options(&self, field: &str) -> Option<LocalBoxFuture<'static, OptionSet>> {
        self.inner.load_options(field)
    }

    /// Current values of every field.
    #[must_use]
    pub fn values(&self) -> Rc<FieldValues> {
        Rc::clone(&self.inner.values.borrow())
    }

    #[must_use]
    pub fn value(&self, field: &str) -> FieldValue {
        self.inner.values.borrow().get(field).clone()
    }

    /// Incremented once per committed mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn is_loading(&self, field: &str) -> bool {
        self.inner.loads.borrow().is_loading(field)
    }

    #[must_use]
    pub fn configs(&self) -> &FieldConfigs {
        &self.inner.configs
    }

    // ─── Subscriptions ───────────────────────────────────────────────────────

    /// Call `listener` after every flush that includes `field`.
    pub fn subscribe(&self, field: &str, listener: impl Fn() + 'static) -> Subscription {
        let id = self
            .inner
            .listeners
            .borrow_mut()
            .add(field, Rc::new(listener));
        Subscription::new(Rc::downgrade(&self.inner), field.to_owned(), id)
    }

    /// Deliver pending notifications now.
    pub fn flush_notifications(&self) {
        self.inner.flush();
    }

    /// Handle for a single field.
    #[must_use]
    pub fn field(&self, name: &str) -> FieldBinding {
        FieldBinding::new(self.clone(), name)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Tear the store down. Listeners are dropped, caches are emptied and any
    /// load that completes later is discarded.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.inner.version.get())
            .field("fields", &self.inner.configs.len())
            .field("destroyed", &self.inner.destroyed.get())
            .finish_non_exhaustive()
    }
}

// ─── Internals ───────────────────────────────────────────────────────────────

impl StoreInner {
    fn known(&self, field: &str) -> Option<&FieldConfig> {
        let config = self.configs.get(field);
        if config.is_none()
            && self.options.warn_unknown_fields
            && self.warned.borrow_mut().insert(field.to_owned())
        {
            warn!(field, "field is not declared in the store's configs");
        }
        config
    }

    fn bump(&self) -> u64 {
        let next = self.version.get() + 1;
        self.version.set(next);
        next
    }

    fn apply(self: &Rc<Self>, requested: Vec<(String, FieldValue)>) {
        if self.destroyed.get() {
            debug!("mutation ignored on destroyed store");
            return;
        }
        let before = Rc::clone(&self.values.borrow());
        let mut working = (*before).clone();
        let mut direct: Vec<String> = Vec::new();
        for (field, value) in requested {
            if self.known(&field).is_none() {
                continue;
            }
            if !direct.contains(&field) {
                direct.push(field.clone());
            }
            working.set(field, value);
        }
        // Repeat until stable: a direct parent may be pruned after its child.
        loop {
            let mut pruned_any = false;
            for field in &direct {
                let Some(config) = self.configs.get(field) else {
                    continue;
                };
                let options = self.raw_options(config, &working);
                let pruned = prune_to_parents(config, &working, &options);
                if &pruned != working.get(field) {
                    working.set(field.clone(), pruned);
                    pruned_any = true;
                }
            }
            if !pruned_any {
                break;
            }
        }
        direct.retain(|f| working.get(f) != before.get(f));
        if direct.is_empty() {
            return;
        }

        let cascaded = cascade_descendants(
            &self.configs,
            direct.iter().map(String::as_str),
            &before,
            &mut working,
            |config| self.raw_options(config, &before),
        );

        let mut committed = direct;
        for field in cascaded {
            if !committed.contains(&field) {
                committed.push(field);
            }
        }
        let changes: Vec<FieldChange> = committed
            .iter()
            .map(|name| FieldChange {
                name: name.clone(),
                value: working.get(name).clone(),
            })
            .collect();

        *self.values.borrow_mut() = Rc::new(working);
        self.commit(&committed);
        debug!(
            changed = ?committed,
            version = self.version.get(),
            "committed field values"
        );

        if let Some(adapter) = &self.adapter {
            push_changes(adapter.as_ref(), &changes);
        }
    }

    fn sync_controlled(self: &Rc<Self>, incoming: &FieldValues) {
        if self.destroyed.get() {
            return;
        }
        let current = Rc::clone(&self.values.borrow());
        let changed: Vec<String> = incoming
            .iter()
            .filter(|(name, value)| self.known(name).is_some() && current.get(name) != *value)
            .map(|(name, _)| name.to_owned())
            .collect();
        if changed.is_empty() {
            return;
        }
        let mut next = (*current).clone();
        for name in &changed {
            next.set(name.clone(), incoming.get(name).clone());
        }
        *self.values.borrow_mut() = Rc::new(next);
        self.commit(&changed);
        debug!(
            changed = ?changed,
            version = self.version.get(),
            "synced controlled values"
        );
    }

    /// Post-commit bookkeeping shared by every value mutation.
    fn commit(self: &Rc<Self>, changed: &[String]) {
        let relationships = self.configs.relationships();
        let mut notify: Vec<String> = changed.to_vec();
        for field in changed {
            for child in relationships.children(field) {
                if !notify.contains(child) {
                    notify.push(child.clone());
                }
                if self.configs.get(child).is_some_and(FieldConfig::is_async) {
                    self.ensure_loaded(child);
                }
            }
        }
        self.bump();
        self.schedule(notify);
    }

    fn set_external_options(self: &Rc<Self>, field: &str, options: OptionSet) {
        if self.destroyed.get() || self.known(field).is_none() {
            return;
        }
        {
            let mut external = self.external.borrow_mut();
            if external.get(field).is_some_and(|cur| cur.same_content(&options)) {
                return;
            }
            external.insert(field.to_owned(), options);
        }
        self.filtered.borrow_mut().invalidate(&field.to_owned());
        self.bump();
        self.schedule([field.to_owned()]);
    }

    // ─── Options ─────────────────────────────────────────────────────────────

    /// Unfiltered options of `config` as seen under `values`: stored external
    /// options, then static options, then the async cache.
    fn raw_options(&self, config: &FieldConfig, values: &FieldValues) -> OptionSet {
        if let Some(external) = self.external.borrow().get(&config.name) {
            return external.clone();
        }
        match &config.options {
            OptionsSource::Static(options) => options.clone(),
            OptionsSource::Async(_) => {
                let parent = ParentSnapshot::resolve(&config.depends_on, values);
                self.loads
                    .borrow()
                    .cached(&request_key(&config.name, &parent))
                    .unwrap_or_default()
            }
        }
    }

    fn options_for(&self, field: &str, external: Option<&OptionSet>) -> OptionSet {
        let Some(config) = self.known(field) else {
            return OptionSet::empty();
        };
        let values = Rc::clone(&self.values.borrow());
        let raw = match external {
            Some(options) => options.clone(),
            None => self.raw_options(config, &values),
        };
        if config.depends_on.is_root() {
            return raw;
        }

        let parent = ParentSnapshot::resolve(&config.depends_on, &values);
        let key = field.to_owned();
        let stamp = (self.version.get(), raw.id(), parent.cache_key());
        if let Some(hit) = self.filtered.borrow().get(&key, &stamp) {
            return hit.clone();
        }
        // Custom filters are caller code; run them with no borrow held.
        let computed = match &config.filter_options {
            Some(filter) => OptionSet::new(filter(raw.as_slice(), &parent)),
            None => {
                let sets = ParentSets::from_snapshot(&config.depends_on, &parent);
                OptionSet::new(filter_options_by_parents(raw.as_slice(), &sets))
            }
        };
        self.filtered
            .borrow_mut()
            .get_or_insert_with(key, stamp, || computed)
            .clone()
    }

    // ─── Async loading ───────────────────────────────────────────────────────

    /// Start a load for `field` unless its current key is cached or in flight.
    fn ensure_loaded(self: &Rc<Self>, field: &str) -> Option<SharedLoad> {
        if self.destroyed.get() {
            return None;
        }
        let config = self.configs.get(field)?;
        let OptionsSource::Async(loader) = &config.options else {
            return None;
        };
        let parent = ParentSnapshot::resolve(&config.depends_on, &self.values.borrow());
        if !parent.is_satisfied() {
            return None;
        }
        let key = request_key(field, &parent);
        if self.loads.borrow().is_known(&key) {
            return None;
        }

        let weak = Rc::downgrade(self);
        let (name, done_key) = (field.to_owned(), key.clone());
        let task = load_task(loader, field, parent, move |loaded| {
            match weak.upgrade() {
                Some(inner) => inner.finish_load(&name, &done_key, loaded),
                None => debug!(field = %name, "option load finished after store was dropped"),
            }
        });
        self.loads.borrow_mut().begin(field, key, task.clone());

        if let Some(spawner) = &self.spawner
            && let Err(err) = spawner.spawn_local(task.clone().map(|_| ()))
        {
            warn!(field, error = %err, "could not spawn option load");
        }
        Some(task)
    }

    fn finish_load(self: &Rc<Self>, field: &str, key: &str, loaded: Option<OptionSet>) {
        if self.destroyed.get() {
            debug!(field, "discarding option load that finished after destroy");
            return;
        }
        if !self.loads.borrow_mut().finish(field, key, loaded) {
            return;
        }
        self.bump();
        self.schedule([field.to_owned()]);
    }

    fn load_options(self: &Rc<Self>, field: &str) -> Option<LocalBoxFuture<'static, OptionSet>> {
        if self.destroyed.get() {
            return None;
        }
        let config = self.known(field)?;
        if !config.is_async() {
            return None;
        }
        let parent = ParentSnapshot::resolve(&config.depends_on, &self.values.borrow());
        if !parent.is_satisfied() {
            return None;
        }
        let key = request_key(field, &parent);
        {
            let loads = self.loads.borrow();
            if let Some(options) = loads.cached(&key) {
                return Some(future::ready(options).boxed_local());
            }
            if let Some(task) = loads.in_flight(&key) {
                return Some(task.boxed_local());
            }
        }
        let task = self.ensure_loaded(field)?;
        self.bump();
        self.schedule([field.to_owned()]);
        Some(task.boxed_local())
    }

    // ─── Snapshots ───────────────────────────────────────────────────────────

    fn snapshot(&self, field: &str) -> Rc<FieldSnapshot> {
        let Some(config) = self.known(field) else {
            return self.snapshots.borrow().inert();
        };
        let version = self.version.get();
        if let Some(current) = self.snapshots.borrow().current(field, version) {
            return current;
        }
        let values = Rc::clone(&self.values.borrow());
        let parent_value = ParentSnapshot::resolve(&config.depends_on, &values);
        let parent_values = config.depends_on.is_multi().then(|| {
            config
                .depends_on
                .parents()
                .iter()
                .map(|p| values.get(p).clone())
                .collect()
        });
        let is_loading = self.loads.borrow().is_loading(field);
        self.snapshots.borrow_mut().refresh(
            field,
            version,
            values.get(field).clone(),
            parent_value,
            parent_values,
            is_loading,
        )
    }

    // ─── Notifications ───────────────────────────────────────────────────────

    fn schedule<I>(self: &Rc<Self>, fields: I)
    where
        I: IntoIterator<Item = String>,
    {
        if self.destroyed.get() || !self.pending.borrow_mut().extend(fields) {
            return;
        }
        let Some(spawner) = &self.spawner else {
            return;
        };
        let weak = Rc::downgrade(self);
        let flush = async move {
            if let Some(inner) = weak.upgrade() {
                inner.flush();
            }
        };
        if let Err(err) = spawner.spawn_local(flush) {
            warn!(error = %err, "could not schedule notification flush");
            self.pending.borrow_mut().unschedule();
        }
    }

    pub(crate) fn flush(&self) {
        let fields = self.pending.borrow_mut().drain();
        if self.destroyed.get() || fields.is_empty() {
            return;
        }
        trace!(fields = fields.len(), "flushing field notifications");
        for field in &fields {
            let listeners = self.listeners.borrow().listeners(field);
            for listener in listeners {
                listener();
            }
        }
    }

    pub(crate) fn unsubscribe(&self, field: &str, id: ListenerId) {
        self.listeners.borrow_mut().remove(field, id);
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.listeners.borrow_mut().clear();
        self.pending.borrow_mut().clear();
        self.snapshots.borrow_mut().clear();
        self.external.borrow_mut().clear();
        self.filtered.borrow_mut().clear();
        self.loads.borrow_mut().clear();
        self.warned.borrow_mut().clear();
        debug!("cascading-field store destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xselect_core::{FieldConfig, XSelectOption};

    fn location_configs() -> FieldConfigs {
        FieldConfigs::new(vec![
            FieldConfig::new("country").options(vec![
                XSelectOption::new("Vietnam", "VN"),
                XSelectOption::new("Thailand", "TH"),
            ]),
            FieldConfig::new("province").depends_on("country").options(vec![
                XSelectOption::new("Ho Chi Minh", "HCM").under("VN"),
                XSelectOption::new("Ha Noi", "HN").under("VN"),
                XSelectOption::new("Bangkok", "BKK").under("TH"),
            ]),
        ])
        .unwrap()
    }

    #[test]
    fn normalize_clears_orphans() {
        let configs = location_configs();
        let mut values = FieldValues::new().with("province", "HCM");
        normalize(&configs, &mut values);
        assert_eq!(values.get("province"), &FieldValue::Empty);
    }

    #[test]
    fn manual_flush_without_spawner() {
        let store = Store::new(location_configs(), FieldValues::new());
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = store.subscribe("country", move || h.set(h.get() + 1));
        store.set_value("country", "VN");
        assert_eq!(hits.get(), 0);
        store.flush_notifications();
        assert_eq!(hits.get(), 1);
        store.flush_notifications();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn filtered_options_follow_parent() {
        let store = Store::new(location_configs(), FieldValues::new().with("country", "TH"));
        let opts = store.get_options("province", None);
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].label, "Bangkok");
        assert!(opts.ptr_eq(&store.get_options("province", None)));
        assert_eq!(store.get_options("country", None).len(), 2);
    }
}
