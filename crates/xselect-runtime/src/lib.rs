#![forbid(unsafe_code)]

//! Runtime: the stateful cascading-field store.
//!
//! A [`Store`] owns the current field values for one form session, keeps
//! dependent fields consistent with their parents (cascade delete), loads
//! parent-dependent options asynchronously, and tells per-field subscribers
//! when their slice of state changed.
//!
//! # Architecture
//!
//! The store is single-threaded: shared state lives in `Rc<RefCell<..>>`
//! cells behind a cheaply cloneable [`Store`] handle. Work that must happen
//! "later" (notification flushes, async option loads) is handed to a
//! caller-supplied [`futures::task::LocalSpawn`], so any local executor can
//! drive it.
//!
//! # Invariants
//!
//! 1. Every committed mutation bumps the store version exactly once.
//! 2. Setting a value equal to the current one is a no-op (no version bump,
//!    no notifications, no adapter call).
//! 3. Value and cascade changes of one call are committed together before any
//!    listener runs; listeners run from a later flush, never inline.
//! 4. Each affected field is notified at most once per flush.
//! 5. After [`Store::destroy`], late async results are discarded.

pub mod adapter;
pub mod binding;
mod loader;
mod notify;
pub mod options;
pub mod snapshot;
pub mod store;

pub use adapter::{FieldChange, FormAdapter};
pub use binding::FieldBinding;
pub use notify::Subscription;
pub use options::StoreOptions;
pub use snapshot::FieldSnapshot;
pub use store::{Store, StoreBuilder};
