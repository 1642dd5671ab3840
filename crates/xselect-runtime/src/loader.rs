//! Async option loading: request keys, the result cache, and in-flight dedup.
//!
//! # Invariants
//!
//! 1. At most one load runs per request key; later callers share it.
//! 2. Only successful loads are cached. A failure reads as an empty option
//!    list and the next trigger for the same key loads again.
//! 3. A field's loading count equals the number of its in-flight requests.
//!
//! # Failure Modes
//!
//! - A loader error is logged at `warn` and resolves its waiters with an
//!   empty [`OptionSet`].
//! - A loader that never resolves leaves the field loading indefinitely.

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use tracing::{trace, warn};

use ahash::AHashMap;
use xselect_core::{OptionLoader, OptionSet, ParentSnapshot};

/// A load in progress, awaitable by any number of callers.
pub(crate) type SharedLoad = Shared<LocalBoxFuture<'static, OptionSet>>;

/// `field:<serialized parent value>`.
pub(crate) fn request_key(field: &str, parent: &ParentSnapshot) -> String {
    format!("{field}:{}", parent.cache_key())
}

/// Call `loader` and wrap its future so that errors degrade to empty options
/// and `on_done` sees the outcome exactly once.
pub(crate) fn load_task<F>(
    loader: &OptionLoader,
    field: &str,
    parent: ParentSnapshot,
    on_done: F,
) -> SharedLoad
where
    F: FnOnce(Option<OptionSet>) + 'static,
{
    trace!(field, parent = %parent.cache_key(), "starting option load");
    let pending = loader(parent);
    let field = field.to_owned();
    async move {
        let loaded = match pending.await {
            Ok(options) => Some(OptionSet::new(options)),
            Err(err) => {
                warn!(field = %field, error = %err, "option load failed");
                None
            }
        };
        on_done(loaded.clone());
        loaded.unwrap_or_default()
    }
    .boxed_local()
    .shared()
}

#[derive(Default)]
pub(crate) struct LoadState {
    cache: AHashMap<String, OptionSet>,
    in_flight: AHashMap<String, SharedLoad>,
    loading: AHashMap<String, usize>,
}

impl LoadState {
    pub(crate) fn cached(&self, key: &str) -> Option<OptionSet> {
        self.cache.get(key).cloned()
    }

    pub(crate) fn in_flight(&self, key: &str) -> Option<SharedLoad> {
        self.in_flight.get(key).cloned()
    }

    pub(crate) fn is_known(&self, key: &str) -> bool {
        self.cache.contains_key(key) || self.in_flight.contains_key(key)
    }

    pub(crate) fn begin(&mut self, field: &str, key: String, task: SharedLoad) {
        self.in_flight.insert(key, task);
        *self.loading.entry(field.to_owned()).or_default() += 1;
    }

    /// Record the end of the request `key` for `field`. Returns false when
    /// the request was no longer tracked (the state was cleared meanwhile).
    pub(crate) fn finish(&mut self, field: &str, key: &str, loaded: Option<OptionSet>) -> bool {
        if self.in_flight.remove(key).is_none() {
            return false;
        }
        if let Some(options) = loaded {
            self.cache.insert(key.to_owned(), options);
        }
        if let Some(count) = self.loading.get_mut(field) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.loading.remove(field);
            }
        }
        true
    }

    pub(crate) fn is_loading(&self, field: &str) -> bool {
        self.loading.contains_key(field)
    }

    pub(crate) fn clear(&mut self) {
        self.cache.clear();
        self.in_flight.clear();
        self.loading.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use futures::executor::block_on;
    use xselect_core::{FieldValue, LoadError, XSelectOption};

    fn loader(calls: Rc<Cell<u32>>, fail: bool) -> OptionLoader {
        Rc::new(move |_parent: ParentSnapshot| {
            calls.set(calls.get() + 1);
            async move {
                if fail {
                    Err(LoadError::failed("backend unavailable"))
                } else {
                    Ok(vec![XSelectOption::new("Ho Chi Minh", "HCM").under("VN")])
                }
            }
            .boxed_local()
        })
    }

    #[test]
    fn request_key_includes_parent() {
        let parent = ParentSnapshot::Single(FieldValue::from("VN"));
        assert_eq!(request_key("province", &parent), r#"province:"VN""#);
        assert_eq!(request_key("country", &ParentSnapshot::None), "country:null");
    }

    #[test]
    fn task_reports_success_once() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let task = load_task(
            &loader(Rc::clone(&calls), false),
            "province",
            ParentSnapshot::None,
            move |loaded| sink.borrow_mut().push(loaded.map(|o| o.len())),
        );
        let a = block_on(task.clone());
        let b = block_on(task);
        assert_eq!(a.len(), 1);
        assert!(a.ptr_eq(&b));
        assert_eq!(calls.get(), 1);
        assert_eq!(*seen.borrow(), [Some(1)]);
    }

    #[test]
    fn failure_resolves_empty() {
        let calls = Rc::new(Cell::new(0));
        let outcome = Rc::new(Cell::new(true));
        let sink = Rc::clone(&outcome);
        let task = load_task(
            &loader(calls, true),
            "province",
            ParentSnapshot::None,
            move |loaded| sink.set(loaded.is_some()),
        );
        assert!(block_on(task).is_empty());
        assert!(!outcome.get());
    }

    #[test]
    fn state_tracks_loading_and_caches_successes() {
        let mut state = LoadState::default();
        let task = futures::future::ready(OptionSet::empty()).boxed_local().shared();
        state.begin("city", "city:a".into(), task.clone());
        state.begin("city", "city:b".into(), task);
        assert!(state.is_loading("city"));
        assert!(state.is_known("city:a"));

        assert!(state.finish("city", "city:a", Some(OptionSet::empty())));
        assert!(state.is_loading("city"));
        assert!(state.finish("city", "city:b", None));
        assert!(!state.is_loading("city"));

        assert!(state.cached("city:a").is_some());
        assert!(state.cached("city:b").is_none());
        assert!(!state.is_known("city:b"));
        assert!(!state.finish("city", "city:b", None));
    }
}
