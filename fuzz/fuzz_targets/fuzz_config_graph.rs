#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use xselect_core::{ConfigError, FieldConfig, FieldConfigs};

#[derive(Arbitrary, Debug)]
struct Field {
    name: u8,
    parents: Vec<u8>,
}

fuzz_target!(|fields: Vec<Field>| {
    if fields.len() > 32 {
        return;
    }
    let configs: Vec<FieldConfig> = fields
        .iter()
        .map(|f| {
            FieldConfig::new(format!("f{}", f.name % 16)).depends_on(
                f.parents
                    .iter()
                    .take(4)
                    .map(|p| format!("f{}", p % 16))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    match FieldConfigs::new(configs) {
        Ok(built) => {
            let rel = built.relationships();
            for field in built.iter() {
                let descendants = rel.descendants(&field.name);
                assert!(!descendants.contains(&field.name), "cycle accepted");
                for child in rel.children(&field.name) {
                    assert!(descendants.contains(child));
                }
            }
        }
        Err(ConfigError::DependencyCycle { path }) => {
            assert!(path.len() >= 2);
            assert_eq!(path.first(), path.last());
        }
        Err(_) => {}
    }
});
