#![forbid(unsafe_code)]

//! xselect public facade crate.
//!
//! Declares cascading select fields and keeps their values consistent:
//!
//! ```
//! use xselect::prelude::*;
//!
//! let configs = FieldConfigs::new(vec![
//!     FieldConfig::new("country").options(vec![XSelectOption::new("Vietnam", "VN")]),
//!     FieldConfig::new("province")
//!         .depends_on("country")
//!         .options(vec![XSelectOption::new("Ho Chi Minh", "HCM").under("VN")]),
//! ])?;
//!
//! let store = Store::new(
//!     configs,
//!     FieldValues::new().with("country", "VN").with("province", "HCM"),
//! );
//! store.set_value("country", FieldValue::Empty);
//! assert_eq!(store.value("province"), FieldValue::Empty);
//! # Ok::<(), ConfigError>(())
//! ```

pub use xselect_core as core;
#[cfg(feature = "runtime")]
pub use xselect_runtime as runtime;

pub mod prelude {
    pub use xselect_core::{
        ConfigError, DependsOn, FieldConfig, FieldConfigs, FieldValue, FieldValues, LoadError,
        OptionFormat, OptionSet, OptionValue, ParentSnapshot, SelectMode, XSelectOption,
        format_options,
    };

    #[cfg(feature = "runtime")]
    pub use xselect_runtime::{
        FieldBinding, FieldChange, FieldSnapshot, FormAdapter, Store, StoreBuilder, StoreOptions,
        Subscription,
    };
}
