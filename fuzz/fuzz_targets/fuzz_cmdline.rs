//! Fuzz target for kernel command-line parsing.

#![no_main]

use bc_core::BootCmdline;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let cmdline = BootCmdline::parse(&raw);
    let _ = cmdline.root_device();
});
