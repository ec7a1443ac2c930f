//! UTF-16LE transcoding and string helpers.
//!
//! Every string on the TDS wire is UTF-16 little-endian, whatever the host
//! representation. Encoding and decoding here are lossy by policy: invalid
//! code points and broken surrogate sequences become U+FFFD instead of
//! failing the surrounding message.

use bytes::{Buf, BufMut};

use crate::prelude::*;

/// Unicode replacement character.
pub const REPLACEMENT: u32 = 0xFFFD;

/// Maximum valid Unicode code point.
pub const MAX_CODE_POINT: u32 = 0x10_FFFF;

// 0xD800..0xDC00 carries the high 10 bits of a pair, 0xDC00..0xE000 the low
// 10 bits. The encoded value is those 20 bits plus 0x10000.
const SURR1: u32 = 0xD800;
const SURR2: u32 = 0xDC00;
const SURR3: u32 = 0xE000;
const SURR_SELF: u32 = 0x1_0000;

/// Whether `cp` lies in the surrogate range.
#[must_use]
pub const fn is_surrogate(cp: u32) -> bool {
    SURR1 <= cp && cp < SURR3
}

/// Write one code point as UTF-16LE.
///
/// Surrogate values and values above [`MAX_CODE_POINT`] are replaced with
/// U+FFFD before encoding.
pub fn write_code_point(dst: &mut impl BufMut, cp: u32) {
    let cp = if is_surrogate(cp) || cp > MAX_CODE_POINT {
        REPLACEMENT
    } else {
        cp
    };

    if cp < SURR_SELF {
        dst.put_u16_le(cp as u16);
    } else {
        let v = cp - SURR_SELF;
        dst.put_u16_le((SURR1 + (v >> 10)) as u16);
        dst.put_u16_le((SURR2 + (v & 0x3FF)) as u16);
    }
}

/// Write a UTF-16LE string without length prefix.
pub fn write_utf16(dst: &mut impl BufMut, s: &str) {
    for c in s.chars() {
        write_code_point(dst, u32::from(c));
    }
}

/// Encode a string as UTF-16LE bytes.
#[must_use]
pub fn encode_utf16(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(utf16_len(s) * 2);
    write_utf16(&mut out, s);
    out
}

/// Encode raw code point values as UTF-16LE bytes.
///
/// Unlike [`encode_utf16`] this accepts values that are not valid scalar
/// values; they are encoded as U+FFFD.
#[must_use]
pub fn encode_code_points<I>(code_points: I) -> Vec<u8>
where
    I: IntoIterator<Item = u32>,
{
    let mut out = Vec::new();
    for cp in code_points {
        write_code_point(&mut out, cp);
    }
    out
}

/// Decode UTF-16LE bytes into a string.
///
/// A high surrogate followed by a low surrogate is combined into one code
/// point. A high surrogate without a following low surrogate, a bare low
/// surrogate, or a dangling odd byte decodes to U+FFFD.
#[must_use]
pub fn decode_utf16(src: &[u8]) -> String {
    let mut out = String::with_capacity(src.len() / 2);
    let mut units = src
        .chunks_exact(2)
        .map(|pair| u32::from(u16::from_le_bytes([pair[0], pair[1]])))
        .peekable();

    while let Some(unit) = units.next() {
        let cp = if (SURR1..SURR2).contains(&unit) {
            match units.peek() {
                Some(&low) if (SURR2..SURR3).contains(&low) => {
                    units.next();
                    (((unit - SURR1) << 10) | (low - SURR2)) + SURR_SELF
                }
                _ => REPLACEMENT,
            }
        } else if is_surrogate(unit) {
            REPLACEMENT
        } else {
            unit
        };
        out.push(char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER));
    }

    if src.len() % 2 == 1 {
        out.push(char::REPLACEMENT_CHARACTER);
    }
    out
}

/// Number of UTF-16 code units needed to encode `s`.
#[must_use]
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Read a UTF-16LE string of `char_count` code units.
///
/// Returns `None` when the buffer is too short.
pub fn read_utf16_string(src: &mut impl Buf, char_count: usize) -> Option<String> {
    let byte_count = char_count * 2;
    if src.remaining() < byte_count {
        return None;
    }
    let raw = src.copy_to_bytes(byte_count);
    Some(decode_utf16(&raw))
}

/// Read a UTF-16LE string prefixed by a 1-byte character count.
pub fn read_b_varchar(src: &mut impl Buf) -> Option<String> {
    if src.remaining() < 1 {
        return None;
    }
    let len = src.get_u8() as usize;
    read_utf16_string(src, len)
}

/// Read a UTF-16LE string prefixed by a 2-byte character count.
pub fn read_us_varchar(src: &mut impl Buf) -> Option<String> {
    if src.remaining() < 2 {
        return None;
    }
    let len = src.get_u16_le() as usize;
    read_utf16_string(src, len)
}

/// Write a UTF-16LE string prefixed by a 1-byte character count.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn write_b_varchar(dst: &mut impl BufMut, s: &str) {
    let len = u8::try_from(utf16_len(s)).expect("b_varchar holds at most 255 code units");
    dst.put_u8(len);
    write_utf16(dst, s);
}

/// Write a UTF-16LE string prefixed by a 2-byte character count.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn write_us_varchar(dst: &mut impl BufMut, s: &str) {
    let len = u16::try_from(utf16_len(s)).expect("us_varchar holds at most 65535 code units");
    dst.put_u16_le(len);
    write_utf16(dst, s);
}
