#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_wire::{LoginRecord, LoginResponse};

fuzz_target!(|data: &[u8]| {
    let _ = LoginRecord::decode(data);
    let _ = LoginResponse::parse(data);
});
