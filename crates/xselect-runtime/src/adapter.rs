//! Bridge to an external value-of-record (typically a form library).
//!
//! The store pushes every committed change through a [`FormAdapter`] so the
//! caller's form state stays authoritative. When one commit changes several
//! fields (a direct change plus its cascade), they arrive together through
//! [`FormAdapter::on_fields_change`].
//!
//! Controlled updates ([`Store::sync_controlled_value`]) are never echoed back.
//!
//! [`Store::sync_controlled_value`]: crate::store::Store::sync_controlled_value

use xselect_core::FieldValue;

/// One field's committed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub name: String,
    pub value: FieldValue,
}

pub trait FormAdapter {
    /// A single field changed.
    fn on_field_change(&self, name: &str, value: &FieldValue);

    /// Several fields changed in one commit. Defaults to one
    /// [`on_field_change`](Self::on_field_change) per entry.
    fn on_fields_change(&self, changes: &[FieldChange]) {
        for change in changes {
            self.on_field_change(&change.name, &change.value);
        }
    }
}

impl<F> FormAdapter for F
where
    F: Fn(&str, &FieldValue),
{
    fn on_field_change(&self, name: &str, value: &FieldValue) {
        self(name, value);
    }
}

/// Route `changes` through `adapter`, batching when there is more than one.
pub(crate) fn push_changes(adapter: &dyn FormAdapter, changes: &[FieldChange]) {
    match changes {
        [] => {}
        [only] => adapter.on_field_change(&only.name, &only.value),
        many => adapter.on_fields_change(many),
    }
}
