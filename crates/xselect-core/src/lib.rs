#![forbid(unsafe_code)]

//! Core: field values, option sets, field declarations, the dependency graph,
//! and the pure cascade-delete / reachability algorithms.
//!
//! Nothing in this crate holds mutable shared state or performs I/O. The
//! stateful store lives in `xselect-runtime`.

pub mod cascade;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod memo;
pub mod option;
pub mod relationships;
pub mod value;

pub use cascade::{
    cascade_delete, cascade_delete_multi_parent, cascade_descendants, prune_to_parents,
};
pub use config::{
    ConfigSetId, DependsOn, FieldConfig, FieldConfigs, FieldDecl, FilterFn, LoadFuture,
    OptionLoader, OptionsSource, SelectMode,
};
pub use error::{ConfigError, LoadError};
pub use filter::{
    KeySet, ParentSets, filter_options_by_parent, filter_options_by_parents, is_reachable,
};
pub use format::{OptionFormat, ParentKey, format_options};
pub use memo::VersionedCache;
pub use option::{OptionSet, OptionSetId, ParentLink, XSelectOption};
pub use relationships::{FieldRelationship, RelationshipMap};
pub use value::{FieldValue, FieldValues, OptionValue, ParentSnapshot};
