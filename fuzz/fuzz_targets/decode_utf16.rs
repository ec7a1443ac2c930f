#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_wire::{decode_utf16, deobfuscate, encode_utf16, obfuscate};

fuzz_target!(|data: &[u8]| {
    let text = decode_utf16(data);
    assert_eq!(decode_utf16(&encode_utf16(&text)), text);

    let password = deobfuscate(data);
    assert_eq!(deobfuscate(&obfuscate(&password)), password);
});
