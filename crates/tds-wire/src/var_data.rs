//! Variable-data block of the login message.
//!
//! The block is a header of 4-byte slots (u16 LE offset, u16 LE length), one
//! per field, followed by the field data in the same order. Two fields break
//! the pattern: the 6-byte client id and the 4-byte SSPI long length are
//! written raw into the header region instead of getting a slot. Data offsets
//! therefore depend on the size of the whole header including those inline
//! fields, so [`layout`] runs in three passes: size accounting, header
//! emission, data emission.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{decode_utf16, utf16_len, write_utf16};
use crate::error::ProtocolError;
use crate::prelude::*;

/// Size of one offset/length slot.
pub const SLOT_SIZE: usize = 4;

/// Field payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text, written as UTF-16LE. The slot records code units.
    Text(String),
    /// Raw bytes. The slot records the byte count, or half of it when
    /// `half_length` is set (bytes that are already UTF-16).
    Bytes {
        /// Field bytes.
        data: Bytes,
        /// Record half the byte count in the slot.
        half_length: bool,
    },
}

/// Where a field's bytes end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Slot in the header, bytes in the data section.
    Referenced,
    /// Bytes spliced into the header region, no slot.
    Inline,
}

/// One field of the variable-data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarField {
    /// Field payload.
    pub payload: Payload,
    /// Field placement.
    pub placement: Placement,
}

impl VarField {
    /// Referenced text field.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::referenced(Payload::Text(text.into()))
    }

    /// Referenced raw byte field.
    #[must_use]
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::referenced(Payload::Bytes {
            data: data.into(),
            half_length: false,
        })
    }

    /// Referenced byte field whose slot records half its byte count.
    #[must_use]
    pub fn half_length(data: impl Into<Bytes>) -> Self {
        Self::referenced(Payload::Bytes {
            data: data.into(),
            half_length: true,
        })
    }

    /// Raw bytes written into the header region.
    #[must_use]
    pub fn inline(data: impl Into<Bytes>) -> Self {
        Self {
            payload: Payload::Bytes {
                data: data.into(),
                half_length: false,
            },
            placement: Placement::Inline,
        }
    }

    /// Referenced field without data.
    #[must_use]
    pub fn empty() -> Self {
        Self::bytes(Bytes::new())
    }

    fn referenced(payload: Payload) -> Self {
        Self {
            payload,
            placement: Placement::Referenced,
        }
    }

    /// Whether the field is written into the header region.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.placement == Placement::Inline
    }

    /// Bytes the payload occupies on the wire.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match &self.payload {
            Payload::Text(text) => utf16_len(text) * 2,
            Payload::Bytes { data, .. } => data.len(),
        }
    }

    /// Value recorded in the field's length slot.
    #[must_use]
    pub fn logical_len(&self) -> usize {
        match &self.payload {
            Payload::Text(text) => utf16_len(text),
            Payload::Bytes {
                data,
                half_length: true,
            } => data.len() / 2,
            Payload::Bytes { data, .. } => data.len(),
        }
    }

    fn write_payload(&self, dst: &mut impl BufMut) {
        match &self.payload {
            Payload::Text(text) => write_utf16(dst, text),
            Payload::Bytes { data, .. } => dst.put_slice(data),
        }
    }
}

fn to_u16(field: usize, value: usize) -> Result<u16, ProtocolError> {
    u16::try_from(value).map_err(|_| ProtocolError::FieldTooLong {
        field,
        length: value,
    })
}

/// Lay out a variable-data block.
///
/// `header_base` is the absolute position of the block within the message;
/// slot offsets are absolute.
pub fn layout(fields: &[VarField], header_base: usize) -> Result<Bytes, ProtocolError> {
    // Size and offset accounting.
    let mut header_end = header_base;
    let mut data_len = 0;
    for field in fields {
        match field.placement {
            Placement::Referenced => {
                header_end += SLOT_SIZE;
                data_len += field.byte_len();
            }
            Placement::Inline => header_end += field.byte_len(),
        }
    }

    let mut buf = BytesMut::with_capacity(header_end - header_base + data_len);

    // Header: slots and inline fields.
    let mut data_offset = header_end;
    for (index, field) in fields.iter().enumerate() {
        match field.placement {
            Placement::Inline => field.write_payload(&mut buf),
            Placement::Referenced => {
                buf.put_u16_le(to_u16(index, data_offset)?);
                buf.put_u16_le(to_u16(index, field.logical_len())?);
                data_offset += field.byte_len();
            }
        }
    }

    // Data, in header order, no padding.
    for field in fields.iter().filter(|f| !f.is_inline()) {
        field.write_payload(&mut buf);
    }

    Ok(buf.freeze())
}

/// Offset/length pair read from a header slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Absolute data offset.
    pub offset: u16,
    /// Recorded length.
    pub length: u16,
}

/// Sequential reader over a variable-data header.
///
/// Fields must be read in header order, calling [`read_inline`] for inline
/// fields and one of the slot readers for the rest.
///
/// [`read_inline`]: VarDataReader::read_inline
pub struct VarDataReader<'a> {
    message: &'a [u8],
    cursor: usize,
}

impl<'a> VarDataReader<'a> {
    /// Start reading the header at `header_base` within `message`.
    #[must_use]
    pub fn new(message: &'a [u8], header_base: usize) -> Self {
        Self {
            message,
            cursor: header_base,
        }
    }

    /// Position of the next header byte.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    fn header_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let bytes = self
            .message
            .get(self.cursor..self.cursor + len)
            .ok_or(ProtocolError::UnexpectedEof)?;
        self.cursor += len;
        Ok(bytes)
    }

    fn field(&self, offset: usize, length: usize) -> Result<&'a [u8], ProtocolError> {
        self.message
            .get(offset..offset + length)
            .ok_or(ProtocolError::FieldOutOfBounds {
                offset,
                length,
                available: self.message.len(),
            })
    }

    /// Read the next slot.
    pub fn read_slot(&mut self) -> Result<Slot, ProtocolError> {
        let raw = self.header_bytes(SLOT_SIZE)?;
        Ok(Slot {
            offset: u16::from_le_bytes([raw[0], raw[1]]),
            length: u16::from_le_bytes([raw[2], raw[3]]),
        })
    }

    /// Read an inline field of `len` bytes.
    pub fn read_inline(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        self.header_bytes(len)
    }

    /// Read a text field.
    pub fn read_text(&mut self) -> Result<String, ProtocolError> {
        let slot = self.read_slot()?;
        let raw = self.field(slot.offset.into(), usize::from(slot.length) * 2)?;
        Ok(decode_utf16(raw))
    }

    /// Read a raw byte field.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        let slot = self.read_slot()?;
        self.field(slot.offset.into(), slot.length.into())
    }

    /// Read a half-length byte field.
    pub fn read_half_length(&mut self) -> Result<&'a [u8], ProtocolError> {
        let slot = self.read_slot()?;
        self.field(slot.offset.into(), usize::from(slot.length) * 2)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::password::obfuscate;

    const CLIENT_ID: [u8; 6] = [0xFA, 0xCA, 0xDE, 0xFA, 0xCA, 0xDE];

    #[test]
    fn test_inline_field_mid_header() {
        let fields = vec![
            VarField::text("host"),
            VarField::text("user"),
            VarField::half_length(obfuscate("pass")),
            VarField::text("app"),
            VarField::inline(CLIENT_ID.to_vec()),
            VarField::text("server"),
            VarField::empty(),
            VarField::bytes(vec![1u8, 2, 3]),
            VarField::text("db"),
        ];
        let block = layout(&fields, 36).unwrap();

        // 8 slots + 6 inline bytes
        let header_len = 8 * SLOT_SIZE + 6;
        let data_start = 36 + header_len;

        // Inline bytes sit verbatim at their header position.
        assert_eq!(&block[16..22], &CLIENT_ID);

        let slot = |pos: usize| {
            (
                u16::from_le_bytes([block[pos], block[pos + 1]]) as usize,
                u16::from_le_bytes([block[pos + 2], block[pos + 3]]) as usize,
            )
        };
        assert_eq!(slot(0), (data_start, 4));
        assert_eq!(slot(4), (data_start + 8, 4));
        assert_eq!(slot(8), (data_start + 16, 4));
        assert_eq!(slot(12), (data_start + 24, 3));
        // Slots after the inline field are shifted by its 6 bytes.
        assert_eq!(slot(22), (data_start + 30, 6));
        assert_eq!(slot(26), (data_start + 42, 0));
        assert_eq!(slot(30), (data_start + 42, 3));
        assert_eq!(slot(34), (data_start + 45, 2));
        assert_eq!(block.len(), header_len + 49);
        assert_eq!(&block[header_len + 42..header_len + 45], &[1, 2, 3]);
    }

    #[test]
    fn test_ms_tds_documentation_example() {
        let fields = vec![
            VarField::text("skostov1"),
            VarField::text("sa"),
            VarField::half_length(Bytes::new()),
            VarField::text("OSQL-32"),
            VarField::text(""),
            VarField::empty(),
            VarField::text("ODBC"),
            VarField::text(""),
            VarField::text(""),
            VarField::inline(vec![0x00u8, 0x50, 0x8B, 0xE2, 0xB7, 0x8F]),
            VarField::empty(),
            VarField::text(""),
            VarField::half_length(Bytes::new()),
            VarField::inline(vec![0u8, 0, 0, 0]),
        ];

        let expected: &[u8] = &[
            0x5E, 0x00, 0x08, 0x00, 0x6E, 0x00, 0x02, 0x00, 0x72, 0x00, 0x00, 0x00, 0x72, 0x00,
            0x07, 0x00, 0x80, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x80, 0x00, 0x04, 0x00,
            0x88, 0x00, 0x00, 0x00, 0x88, 0x00, 0x00, 0x00, 0x00, 0x50, 0x8B, 0xE2, 0xB7, 0x8F,
            0x88, 0x00, 0x00, 0x00, 0x88, 0x00, 0x00, 0x00, 0x88, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x73, 0x00, 0x6B, 0x00, 0x6F, 0x00, 0x73, 0x00, 0x74, 0x00, 0x6F, 0x00,
            0x76, 0x00, 0x31, 0x00, 0x73, 0x00, 0x61, 0x00, 0x4F, 0x00, 0x53, 0x00, 0x51, 0x00,
            0x4C, 0x00, 0x2D, 0x00, 0x33, 0x00, 0x32, 0x00, 0x4F, 0x00, 0x44, 0x00, 0x42, 0x00,
            0x43, 0x00,
        ];

        assert_eq!(&layout(&fields, 36).unwrap()[..], expected);
    }

    #[test]
    fn test_captured_client_block() {
        let fields = vec![
            VarField::text("WS-CZC1279MCC"),
            VarField::text("gotest"),
            VarField::half_length(obfuscate("gotest")),
            VarField::text("go-tds"),
            VarField::text(""),
            VarField::empty(),
            VarField::text("go-tds"),
            VarField::text(""),
            VarField::text("[gotest]"),
            VarField::inline(CLIENT_ID.to_vec()),
            VarField::empty(),
            VarField::text(""),
            VarField::half_length(obfuscate("")),
            VarField::inline(vec![0u8, 0, 0, 0]),
        ];

        let expected: &[u8] = &[
            0x5E, 0x00, 0x0D, 0x00, 0x78, 0x00, 0x06, 0x00, 0x84, 0x00, 0x06, 0x00, 0x90, 0x00,
            0x06, 0x00, 0x9C, 0x00, 0x00, 0x00, 0x9C, 0x00, 0x00, 0x00, 0x9C, 0x00, 0x06, 0x00,
            0xA8, 0x00, 0x00, 0x00, 0xA8, 0x00, 0x08, 0x00, 0xFA, 0xCA, 0xDE, 0xFA, 0xCA, 0xDE,
            0xB8, 0x00, 0x00, 0x00, 0xB8, 0x00, 0x00, 0x00, 0xB8, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x57, 0x00, 0x53, 0x00, 0x2D, 0x00, 0x43, 0x00, 0x5A, 0x00, 0x43, 0x00,
            0x31, 0x00, 0x32, 0x00, 0x37, 0x00, 0x39, 0x00, 0x4D, 0x00, 0x43, 0x00, 0x43, 0x00,
            0x67, 0x00, 0x6F, 0x00, 0x74, 0x00, 0x65, 0x00, 0x73, 0x00, 0x74, 0x00, 0xD3, 0xA5,
            0x53, 0xA5, 0xE2, 0xA5, 0xF3, 0xA5, 0x92, 0xA5, 0xE2, 0xA5, 0x67, 0x00, 0x6F, 0x00,
            0x2D, 0x00, 0x74, 0x00, 0x64, 0x00, 0x73, 0x00, 0x67, 0x00, 0x6F, 0x00, 0x2D, 0x00,
            0x74, 0x00, 0x64, 0x00, 0x73, 0x00, 0x5B, 0x00, 0x67, 0x00, 0x6F, 0x00, 0x74, 0x00,
            0x65, 0x00, 0x73, 0x00, 0x74, 0x00, 0x5D, 0x00,
        ];

        assert_eq!(&layout(&fields, 36).unwrap()[..], expected);
    }

    #[test]
    fn test_text_length_counts_code_units() {
        let field = VarField::text("a\u{1F600}");
        assert_eq!(field.logical_len(), 3);
        assert_eq!(field.byte_len(), 6);
    }

    #[test]
    fn test_offset_overflow() {
        let fields = vec![
            VarField::bytes(vec![0u8; u16::MAX as usize]),
            VarField::text("x"),
        ];
        let err = layout(&fields, 36).unwrap_err();
        assert!(matches!(err, ProtocolError::FieldTooLong { field: 1, .. }));
    }

    #[test]
    fn test_reader_walks_header() {
        let fields = vec![
            VarField::text("host"),
            VarField::half_length(obfuscate("pw")),
            VarField::inline(CLIENT_ID.to_vec()),
            VarField::bytes(vec![9u8, 8]),
        ];
        let mut message = vec![0u8; 10];
        message.extend_from_slice(&layout(&fields, 10).unwrap());

        let mut reader = VarDataReader::new(&message, 10);
        assert_eq!(reader.read_text().unwrap(), "host");
        assert_eq!(
            crate::password::deobfuscate(reader.read_half_length().unwrap()),
            "pw"
        );
        assert_eq!(reader.read_inline(6).unwrap(), &CLIENT_ID);
        assert_eq!(reader.read_bytes().unwrap(), &[9, 8]);
        assert_eq!(reader.position(), 10 + 3 * SLOT_SIZE + 6);
    }

    #[test]
    fn test_reader_out_of_bounds() {
        // slot pointing at offset 0x40 with 4 code units in a 12-byte message
        let message = [0x40, 0x00, 0x04, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut reader = VarDataReader::new(&message, 0);
        assert!(matches!(
            reader.read_text().unwrap_err(),
            ProtocolError::FieldOutOfBounds {
                offset: 0x40,
                length: 8,
                available: 12
            }
        ));

        let mut reader = VarDataReader::new(&message, 10);
        assert!(matches!(
            reader.read_slot().unwrap_err(),
            ProtocolError::UnexpectedEof
        ));
    }
}
