//! Generic TDS token stream framing.
//!
//! Every token starts with a definition byte whose class bits (`0x30`) say
//! how much data follows:
//!
//! | class  | meaning          | data                                        |
//! |--------|------------------|---------------------------------------------|
//! | `0x10` | zero length      | none                                        |
//! | `0x30` | fixed length     | `1 << ((definition & 0x0C) >> 2)` bytes     |
//! | `0x20` | variable length  | u16 little-endian length, then that many    |
//!
//! The variable-count class (`0x00`, e.g. COLMETADATA) needs result-set
//! context and is rejected here.
//!
//! ## Usage
//!
//! ```rust
//! use tds_wire::token::{build_token_stream, parse_token_stream, Token, VARIABLE_LENGTH};
//!
//! let tokens = vec![Token::variable(VARIABLE_LENGTH, &b"hello"[..])];
//! let wire = build_token_stream(&tokens)?;
//! assert_eq!(parse_token_stream(&wire)?, tokens);
//! # Ok::<(), tds_wire::ProtocolError>(())
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::prelude::*;

/// Definition class of tokens without data.
pub const ZERO_LENGTH: u8 = 0x10;

/// Definition class of tokens with 1, 2, 4 or 8 data bytes.
pub const FIXED_LENGTH: u8 = 0x30;

/// Definition class of tokens with an explicit length prefix.
pub const VARIABLE_LENGTH: u8 = 0x20;

/// Largest payload a variable-length token can carry.
pub const MAX_VARIABLE_LENGTH: usize = u16::MAX as usize;

const CLASS_MASK: u8 = 0x30;
const FIXED_SIZE_MASK: u8 = 0x0C;

/// Framing class selected by a definition byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    /// No data follows the definition byte.
    ZeroLength,
    /// Exactly this many data bytes follow.
    FixedLength(usize),
    /// A u16 LE length prefix and that many bytes follow.
    VariableLength,
}

impl TokenClass {
    /// Classify a definition byte.
    pub fn of(definition: u8) -> Result<Self, ProtocolError> {
        match definition & CLASS_MASK {
            ZERO_LENGTH => Ok(Self::ZeroLength),
            FIXED_LENGTH => {
                let class = (definition & FIXED_SIZE_MASK) >> 2;
                Ok(Self::FixedLength(1 << class))
            }
            VARIABLE_LENGTH => Ok(Self::VariableLength),
            _ => Err(ProtocolError::UnknownTokenClass(definition)),
        }
    }
}

/// Size bits for a fixed-length payload.
fn fixed_size_bits(len: usize) -> Option<u8> {
    match len {
        1 => Some(0x00),
        2 => Some(0x04),
        4 => Some(0x08),
        8 => Some(0x0C),
        _ => None,
    }
}

/// Token types the session layer interprets.
///
/// Only types whose payload follows the generic framing are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenType {
    /// Return status (RETURNSTATUS), 4 fixed bytes.
    ReturnStatus = 0x79,
    /// Order (ORDER).
    Order = 0xA9,
    /// Error message (ERROR).
    Error = 0xAA,
    /// Informational message (INFO).
    Info = 0xAB,
    /// Login acknowledgment (LOGINACK).
    LoginAck = 0xAD,
    /// Environment change (ENVCHANGE).
    EnvChange = 0xE3,
    /// SSPI authentication (SSPI).
    Sspi = 0xED,
}

impl TokenType {
    /// Create a token type from a definition byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x79 => Some(Self::ReturnStatus),
            0xA9 => Some(Self::Order),
            0xAA => Some(Self::Error),
            0xAB => Some(Self::Info),
            0xAD => Some(Self::LoginAck),
            0xE3 => Some(Self::EnvChange),
            0xED => Some(Self::Sspi),
            _ => None,
        }
    }
}

/// One framed token.
///
/// `length` mirrors the payload length as it was (or will be) framed. The
/// builder always derives the wire length from `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Definition byte.
    pub definition: u8,
    /// Payload length.
    pub length: usize,
    /// Payload, `None` for zero-length tokens.
    pub data: Option<Bytes>,
}

impl Token {
    /// Create a token without data.
    #[must_use]
    pub fn zero_length(definition: u8) -> Self {
        Self {
            definition,
            length: 0,
            data: None,
        }
    }

    /// Create a fixed-length token.
    ///
    /// The size bits of `definition` are recomputed from `data` on encode.
    #[must_use]
    pub fn fixed(definition: u8, data: impl Into<Bytes>) -> Self {
        Self::with_data(definition, data.into())
    }

    /// Create a variable-length token.
    #[must_use]
    pub fn variable(definition: u8, data: impl Into<Bytes>) -> Self {
        Self::with_data(definition, data.into())
    }

    fn with_data(definition: u8, data: Bytes) -> Self {
        Self {
            definition,
            length: data.len(),
            data: Some(data),
        }
    }

    /// Framing class of this token.
    pub fn class(&self) -> Result<TokenClass, ProtocolError> {
        TokenClass::of(self.definition)
    }

    /// Known token type, if any.
    #[must_use]
    pub fn token_type(&self) -> Option<TokenType> {
        TokenType::from_u8(self.definition)
    }

    /// Payload bytes, empty for zero-length tokens.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Encode the token.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
        match self.class()? {
            TokenClass::ZeroLength => {
                if self.data.is_some() {
                    return Err(ProtocolError::UnexpectedPayload(self.definition));
                }
                dst.put_u8(self.definition);
            }
            TokenClass::FixedLength(_) => {
                let data = self.require_data()?;
                let bits = fixed_size_bits(data.len()).ok_or(ProtocolError::InvalidFixedLength {
                    definition: self.definition,
                    length: data.len(),
                })?;
                dst.put_u8((self.definition & !FIXED_SIZE_MASK) | bits);
                dst.put_slice(data);
            }
            TokenClass::VariableLength => {
                let data = self.require_data()?;
                if data.len() > MAX_VARIABLE_LENGTH {
                    return Err(ProtocolError::PayloadTooLarge {
                        length: data.len(),
                        max: MAX_VARIABLE_LENGTH,
                    });
                }
                dst.put_u8(self.definition);
                dst.put_u16_le(data.len() as u16);
                dst.put_slice(data);
            }
        }
        Ok(())
    }

    fn require_data(&self) -> Result<&Bytes, ProtocolError> {
        self.data
            .as_ref()
            .ok_or(ProtocolError::MissingPayload(self.definition))
    }
}

/// Streaming reader over a token buffer.
///
/// On error the reader does not advance, so the failing token can be
/// inspected through [`position`](TokenReader::position).
pub struct TokenReader {
    data: Bytes,
    position: usize,
}

impl TokenReader {
    /// Create a new reader over a token buffer.
    #[must_use]
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0 }
    }

    /// Get remaining bytes in the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to parse.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    /// Peek at the next definition byte without consuming it.
    #[must_use]
    pub fn peek_definition(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    /// Get the current position in the buffer.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Parse the next token.
    ///
    /// Returns `None` once the buffer ends cleanly between tokens.
    pub fn next_token(&mut self) -> Result<Option<Token>, ProtocolError> {
        if !self.has_remaining() {
            return Ok(None);
        }

        let mut buf = &self.data[self.position..];
        let definition = buf.get_u8();

        let (header_len, token) = match TokenClass::of(definition)? {
            TokenClass::ZeroLength => (1, Token::zero_length(definition)),
            TokenClass::FixedLength(size) => {
                let data = self.take_payload(1, size, buf.remaining())?;
                (1, Token::with_data(definition, data))
            }
            TokenClass::VariableLength => {
                if buf.remaining() < 2 {
                    return Err(ProtocolError::UnexpectedEof);
                }
                let length = buf.get_u16_le() as usize;
                let data = self.take_payload(3, length, buf.remaining())?;
                (3, Token::with_data(definition, data))
            }
        };

        self.position += header_len + token.length;
        Ok(Some(token))
    }

    fn take_payload(
        &self,
        skip: usize,
        needed: usize,
        available: usize,
    ) -> Result<Bytes, ProtocolError> {
        if available < needed {
            return Err(ProtocolError::Truncated { needed, available });
        }
        let start = self.position + skip;
        Ok(self.data.slice(start..start + needed))
    }
}

impl Iterator for TokenReader {
    type Item = Result<Token, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                // Stop after the first framing error.
                self.position = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Parse a complete token stream.
///
/// Fails as a whole on the first framing error; no partial result is
/// returned.
pub fn parse_token_stream(src: &[u8]) -> Result<Vec<Token>, ProtocolError> {
    TokenReader::new(Bytes::copy_from_slice(src)).collect()
}

/// Build a token stream.
pub fn build_token_stream(tokens: &[Token]) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(tokens.iter().map(|t| t.length + 3).sum());
    for token in tokens {
        token.encode(&mut buf)?;
    }
    Ok(buf.freeze())
}
