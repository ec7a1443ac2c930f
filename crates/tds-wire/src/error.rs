//! Protocol-level error types.

use thiserror::Error;

use crate::message::ServerMessage;
use crate::version::TdsVersion;

/// Errors that can occur while framing tokens or building login messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Input ended in the middle of a definition byte or length prefix.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A token declared more data than the buffer holds.
    #[error("truncated token: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the token declared.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Definition byte belongs to a class the generic codec cannot frame.
    #[error("unknown token class in definition byte {0:#04x}")]
    UnknownTokenClass(u8),

    /// Fixed-length token whose payload is not 1, 2, 4 or 8 bytes.
    #[error("fixed-length token {definition:#04x} cannot carry {length} bytes")]
    InvalidFixedLength {
        /// Token definition byte.
        definition: u8,
        /// Payload length supplied.
        length: usize,
    },

    /// Variable-length payload does not fit the length prefix.
    #[error("token payload too large: {length} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload length supplied.
        length: usize,
        /// Largest encodable payload.
        max: usize,
    },

    /// Fixed or variable token built without a payload.
    #[error("token {0:#04x} requires a payload")]
    MissingPayload(u8),

    /// Zero-length token built with a payload.
    #[error("zero-length token {0:#04x} cannot carry a payload")]
    UnexpectedPayload(u8),

    /// Offset/length pair in a variable-data header points past the buffer.
    #[error("field at offset {offset} with length {length} exceeds {available} bytes")]
    FieldOutOfBounds {
        /// Absolute offset of the field.
        offset: usize,
        /// Byte length of the field.
        length: usize,
        /// Bytes available in the message.
        available: usize,
    },

    /// Option requires a newer protocol version than the one configured.
    #[error("{feature} requires {required}, configured {configured}")]
    FeatureRequiresVersion {
        /// Name of the option.
        feature: &'static str,
        /// First version that supports the option.
        required: TdsVersion,
        /// Version the login was configured with.
        configured: TdsVersion,
    },

    /// Variable-data field offset or length exceeds 16 bits.
    #[error("variable-data field {field} too long: {length}")]
    FieldTooLong {
        /// Position of the field in the descriptor list.
        field: usize,
        /// Offending offset or length.
        length: usize,
    },

    /// Message length exceeds what the length field can carry.
    #[error("packet too large: {length} bytes (max {max})")]
    PacketTooLarge {
        /// Actual message length.
        length: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Server answered the login with an ERROR token.
    #[error("login rejected: {0}")]
    LoginRejected(ServerMessage),

    /// Login response contained no LOGINACK token.
    #[error("no login acknowledgment in response")]
    NoLoginAck,

    /// Login response contained more than one LOGINACK token.
    #[error("expected one login acknowledgment, got {0}")]
    MultipleLoginAcks(usize),
}

impl ProtocolError {
    /// Whether the error comes from malformed token or message framing.
    #[must_use]
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof
                | Self::Truncated { .. }
                | Self::UnknownTokenClass(_)
                | Self::InvalidFixedLength { .. }
                | Self::PayloadTooLarge { .. }
                | Self::MissingPayload(_)
                | Self::UnexpectedPayload(_)
                | Self::FieldOutOfBounds { .. }
        )
    }

    /// Whether the error is caused by the login configuration.
    ///
    /// These are not worth retrying until the configuration changes.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::FeatureRequiresVersion { .. }
                | Self::FieldTooLong { .. }
                | Self::PacketTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ProtocolError::UnexpectedEof.is_framing());
        assert!(ProtocolError::UnknownTokenClass(0x81).is_framing());
        assert!(!ProtocolError::NoLoginAck.is_framing());

        let err = ProtocolError::FeatureRequiresVersion {
            feature: "OLE DB",
            required: TdsVersion::V7_2,
            configured: TdsVersion::V7_1,
        };
        assert!(err.is_configuration());
        assert!(!err.is_framing());
        assert_eq!(err.to_string(), "OLE DB requires TDS 7.2, configured TDS 7.1");
    }

    #[test]
    fn test_display_hex() {
        let err = ProtocolError::UnknownTokenClass(0x81);
        assert_eq!(err.to_string(), "unknown token class in definition byte 0x81");
    }
}
