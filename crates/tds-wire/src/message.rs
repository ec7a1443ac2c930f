//! Server message payloads.
//!
//! Decoders here take the payload of a variable-length token, with the length
//! prefix already stripped by [`crate::token`].

use core::fmt;

use bytes::Buf;

use crate::codec::{read_b_varchar, read_us_varchar};
use crate::error::ProtocolError;
use crate::prelude::*;
use crate::version::TdsVersion;

/// ERROR or INFO message sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    /// Message number.
    pub number: i32,
    /// Message state.
    pub state: u8,
    /// Severity class.
    pub class: u8,
    /// Message text.
    pub message: String,
    /// Server name.
    pub server: String,
    /// Procedure name.
    pub procedure: String,
    /// Line number.
    pub line: i32,
}

impl ServerMessage {
    /// Decode an ERROR or INFO payload.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        // number (4) + state (1) + class (1) + message (us_varchar) +
        // server (b_varchar) + procedure (b_varchar) + line (4)
        if src.remaining() < 6 {
            return Err(ProtocolError::UnexpectedEof);
        }

        let number = src.get_i32_le();
        let state = src.get_u8();
        let class = src.get_u8();

        let message = read_us_varchar(src).ok_or(ProtocolError::UnexpectedEof)?;
        let server = read_b_varchar(src).ok_or(ProtocolError::UnexpectedEof)?;
        let procedure = read_b_varchar(src).ok_or(ProtocolError::UnexpectedEof)?;

        if src.remaining() < 4 {
            return Err(ProtocolError::UnexpectedEof);
        }
        let line = src.get_i32_le();

        Ok(Self {
            number,
            state,
            class,
            message,
            server,
            procedure,
            line,
        })
    }

    /// Check if this is a fatal error (severity >= 20).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.class >= 20
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Msg {}, Level {}, State {}, Line {}: {}",
            self.number, self.class, self.state, self.line, self.message
        )
    }
}

/// Server program version reported in LOGINACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Build number.
    pub build: u16,
}

impl fmt::Display for ProgramVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Login acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAck {
    /// Interface type.
    pub interface: u8,
    /// TDS version accepted by the server.
    pub tds_version: TdsVersion,
    /// Program name.
    pub prog_name: String,
    /// Program version.
    pub prog_version: ProgramVersion,
}

impl LoginAck {
    /// Decode a LOGINACK payload.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        // interface (1) + tds_version (4, big-endian) + prog_name (b_varchar) + prog_version (4)
        if src.remaining() < 5 {
            return Err(ProtocolError::UnexpectedEof);
        }

        let interface = src.get_u8();
        let tds_version = TdsVersion::new(src.get_u32());
        let prog_name = read_b_varchar(src).ok_or(ProtocolError::UnexpectedEof)?;

        if src.remaining() < 4 {
            return Err(ProtocolError::UnexpectedEof);
        }
        let prog_version = ProgramVersion {
            major: src.get_u8(),
            minor: src.get_u8(),
            build: src.get_u16(),
        };

        Ok(Self {
            interface,
            tds_version,
            prog_name,
            prog_version,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::{write_b_varchar, write_us_varchar};
    use bytes::{BufMut, BytesMut};

    fn error_payload(class: u8) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_i32_le(18456);
        buf.put_u8(1);
        buf.put_u8(class);
        write_us_varchar(&mut buf, "Login failed for user 'sa'.");
        write_b_varchar(&mut buf, "DB01");
        write_b_varchar(&mut buf, "");
        buf.put_i32_le(1);
        buf
    }

    #[test]
    fn test_server_message_decode() {
        let mut payload = error_payload(14).freeze();
        let msg = ServerMessage::decode(&mut payload).unwrap();

        assert_eq!(msg.number, 18456);
        assert_eq!(msg.state, 1);
        assert_eq!(msg.class, 14);
        assert_eq!(msg.message, "Login failed for user 'sa'.");
        assert_eq!(msg.server, "DB01");
        assert_eq!(msg.procedure, "");
        assert_eq!(msg.line, 1);
        assert!(!msg.is_fatal());
        assert!(!payload.has_remaining());
        assert_eq!(
            msg.to_string(),
            "Msg 18456, Level 14, State 1, Line 1: Login failed for user 'sa'."
        );
    }

    #[test]
    fn test_server_message_fatal() {
        let msg = ServerMessage::decode(&mut error_payload(20).freeze()).unwrap();
        assert!(msg.is_fatal());
    }

    #[test]
    fn test_server_message_truncated() {
        let payload = error_payload(14);
        let mut short = &payload[..payload.len() - 2];
        assert!(matches!(
            ServerMessage::decode(&mut short),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_login_ack_decode() {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        buf.put_slice(&TdsVersion::V7_4.to_wire());
        write_b_varchar(&mut buf, "Microsoft SQL Server");
        buf.put_slice(&[16, 0, 0x10, 0x7A]);

        let ack = LoginAck::decode(&mut buf.freeze()).unwrap();
        assert_eq!(ack.interface, 1);
        assert_eq!(ack.tds_version, TdsVersion::V7_4);
        assert_eq!(ack.prog_name, "Microsoft SQL Server");
        assert_eq!(ack.prog_version.to_string(), "16.0.4218");
    }
}
