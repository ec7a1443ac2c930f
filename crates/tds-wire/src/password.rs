//! Login password obfuscation.
//!
//! The password travels as UTF-16LE with every byte nibble-swapped and then
//! XORed with `0xA5`. This is obfuscation, not encryption; use TLS.

use crate::codec::{decode_utf16, encode_utf16};
use crate::prelude::*;

const XOR_MASK: u8 = 0xA5;

#[inline]
const fn obfuscate_byte(b: u8) -> u8 {
    b.rotate_left(4) ^ XOR_MASK
}

#[inline]
const fn deobfuscate_byte(b: u8) -> u8 {
    (b ^ XOR_MASK).rotate_right(4)
}

/// Obfuscate a password into its wire bytes.
#[must_use]
pub fn obfuscate(password: &str) -> Vec<u8> {
    let mut out = encode_utf16(password);
    for b in &mut out {
        *b = obfuscate_byte(*b);
    }
    out
}

/// Recover the password from its wire bytes.
///
/// Malformed UTF-16 decodes lossily, so this never fails.
#[must_use]
pub fn deobfuscate(wire: &[u8]) -> String {
    let plain: Vec<u8> = wire.iter().map(|&b| deobfuscate_byte(b)).collect();
    decode_utf16(&plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOTEST: [u8; 12] = [
        0xD3, 0xA5, 0x53, 0xA5, 0xE2, 0xA5, 0xF3, 0xA5, 0x92, 0xA5, 0xE2, 0xA5,
    ];

    #[test]
    fn test_known_vector_encode() {
        assert_eq!(obfuscate("gotest"), GOTEST);
    }

    #[test]
    fn test_known_vector_decode() {
        assert_eq!(deobfuscate(&GOTEST), "gotest");
    }

    #[test]
    fn test_single_char() {
        // 'a' = 0x0061: 0x61 -> 0x16 ^ 0xA5 = 0xB3, 0x00 -> 0xA5
        assert_eq!(obfuscate("a"), [0xB3, 0xA5]);
    }

    #[test]
    fn test_roundtrip_with_surrogates() {
        let original = "test123世界blaat\u{1F600}";
        assert_eq!(deobfuscate(&obfuscate(original)), original);
    }

    #[test]
    fn test_byte_transform_inverts() {
        for b in 0..=u8::MAX {
            assert_eq!(deobfuscate_byte(obfuscate_byte(b)), b);
        }
    }
}
