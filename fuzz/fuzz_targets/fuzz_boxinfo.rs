//! Fuzz target for boot-information file parsing.
//!
//! The file is written by the image build and may be truncated or edited by
//! hand, so parsing must never panic.

#![no_main]

use bc_core::boxinfo::BoxInfo;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let store = BoxInfo::from_text(text);
        // Unknown keys fall through to the default
        let _ = store.model();
        let _ = store.checksum().as_value();
    }
});
