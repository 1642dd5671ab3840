#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use xselect_core::{FieldConfig, FieldConfigs, FieldValue, FieldValues, XSelectOption};
use xselect_runtime::Store;

#[derive(Arbitrary, Debug)]
enum Edit {
    Set { field: u8, keys: Vec<u8> },
    Clear { field: u8 },
    External { field: u8, keys: Vec<u8> },
    Sync { field: u8, keys: Vec<u8> },
    Flush,
}

const FIELDS: [&str; 4] = ["region", "country", "province", "city"];

fn key(k: u8) -> String {
    format!("k{}", k % 8)
}

fn options(parent_offset: u8) -> Vec<XSelectOption> {
    (0..8u8)
        .map(|k| XSelectOption::new(key(k), key(k)).under(key(k.wrapping_add(parent_offset))))
        .collect()
}

fn configs() -> FieldConfigs {
    FieldConfigs::new(vec![
        FieldConfig::new("region").multiple(),
        FieldConfig::new("country")
            .depends_on("region")
            .multiple()
            .options(options(1)),
        FieldConfig::new("province")
            .depends_on("country")
            .multiple()
            .options(options(3)),
        FieldConfig::new("city")
            .depends_on(["country", "province"])
            .multiple()
            .options(options(5)),
    ])
    .expect("static configs are valid")
}

fn value(keys: &[u8]) -> FieldValue {
    FieldValue::many(keys.iter().take(8).map(|k| key(*k)))
}

fuzz_target!(|edits: Vec<Edit>| {
    let store = Store::new(configs(), FieldValues::new());
    for edit in edits.iter().take(64) {
        let version = store.version();
        match edit {
            Edit::Set { field, keys } => {
                store.set_value(FIELDS[usize::from(*field) % 4], value(keys));
                assert!(store.version() <= version + 1);
            }
            Edit::Clear { field } => {
                store.field(FIELDS[usize::from(*field) % 4]).clear();
            }
            Edit::External { field, keys } => {
                let opts: Vec<XSelectOption> =
                    keys.iter().take(8).map(|k| XSelectOption::new(key(*k), key(*k))).collect();
                store.set_external_options(FIELDS[usize::from(*field) % 4], opts);
            }
            Edit::Sync { field, keys } => {
                let values = FieldValues::new().with(FIELDS[usize::from(*field) % 4], value(keys));
                store.sync_controlled_value(&values);
            }
            Edit::Flush => store.flush_notifications(),
        }
        let snap = store.get_field_snapshot("city");
        assert!(std::rc::Rc::ptr_eq(&snap, &store.get_field_snapshot("city")));
    }
});
