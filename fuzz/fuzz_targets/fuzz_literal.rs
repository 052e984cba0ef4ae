//! Fuzz target for the literal value parser.

#![no_main]

use bc_common::parse_literal;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(value) = parse_literal(text) {
            let _ = value.is_truthy();
            let _ = value.to_string();
        }
    }
});
