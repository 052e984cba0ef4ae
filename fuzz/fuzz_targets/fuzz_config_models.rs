//! Fuzz target for model-family override files.

#![no_main]

use bc_config::validate::validate_families;
use bc_config::ModelFamilies;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(table) = serde_json::from_slice::<ModelFamilies>(data) {
        let _ = validate_families(&table);
    }
});
