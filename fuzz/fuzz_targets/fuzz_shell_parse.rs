#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = r2lab_monitor::stages::shell::release::parse(data);
});
