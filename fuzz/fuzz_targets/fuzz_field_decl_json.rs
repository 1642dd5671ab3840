#![no_main]

use libfuzzer_sys::fuzz_target;
use xselect_core::{FieldConfigs, FieldValues};
use xselect_runtime::Store;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Malformed or invalid declarations must be rejected, never panic.
    let Ok(configs) = FieldConfigs::from_json(text) else {
        return;
    };
    let store = Store::new(configs.clone(), FieldValues::new());
    for field in configs.iter() {
        let _ = store.get_options(&field.name, None);
        let _ = store.get_field_snapshot(&field.name);
    }
});
