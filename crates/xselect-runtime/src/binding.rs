//! Per-field consumer handle.
//!
//! A [`FieldBinding`] is what a rendering layer holds for one select control:
//! it subscribes to the field, pulls its snapshot and options, and writes the
//! user's selection back. It is the Rust shape of a
//! subscribe/get-snapshot external-store pairing.

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use xselect_core::{FieldConfig, FieldValue, OptionSet};

use crate::notify::Subscription;
use crate::snapshot::FieldSnapshot;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct FieldBinding {
    store: Store,
    name: String,
}

impl FieldBinding {
    pub(crate) fn new(store: Store, name: &str) -> Self {
        Self {
            store,
            name: name.to_owned(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's declaration, if it is declared.
    #[must_use]
    pub fn config(&self) -> Option<&FieldConfig> {
        self.store.configs().get(&self.name)
    }

    #[must_use]
    pub fn snapshot(&self) -> Rc<FieldSnapshot> {
        self.store.get_field_snapshot(&self.name)
    }

    #[must_use]
    pub fn options(&self) -> OptionSet {
        self.store.get_options(&self.name, None)
    }

    pub fn set(&self, value: impl Into<FieldValue>) {
        self.store.set_value(&self.name, value);
    }

    /// Clear the selection (an empty list for multi-select fields).
    pub fn clear(&self) {
        let mode = self.config().map(|c| c.mode).unwrap_or_default();
        self.set(FieldValue::cleared(mode));
    }

    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
        self.store.subscribe(&self.name, listener)
    }

    #[must_use]
    pub fn load(&self) -> Option<LocalBoxFuture<'static, OptionSet>> {
        self.store.load_options(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use xselect_core::{FieldConfigs, FieldValues, XSelectOption};

    fn store() -> Store {
        let configs = FieldConfigs::new(vec![
            FieldConfig::new("country").options(vec![XSelectOption::new("Vietnam", "VN")]),
            FieldConfig::new("province")
                .depends_on("country")
                .multiple()
                .options(vec![XSelectOption::new("Ho Chi Minh", "HCM").under("VN")]),
        ])
        .unwrap();
        Store::new(configs, FieldValues::new())
    }

    #[test]
    fn binding_round_trip() {
        let store = store();
        let province = store.field("province");
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = province.subscribe(move || h.set(h.get() + 1));

        store.field("country").set("VN");
        assert_eq!(province.options().len(), 1);
        province.set(vec!["HCM"]);
        assert_eq!(province.snapshot().value, FieldValue::many(["HCM"]));

        store.flush_notifications();
        assert_eq!(hits.get(), 1);

        province.clear();
        assert_eq!(province.snapshot().value, FieldValue::Many(vec![]));
    }

    #[test]
    fn static_field_has_no_load() {
        let store = store();
        assert!(store.field("country").load().is_none());
        assert!(store.field("nope").config().is_none());
    }
}
