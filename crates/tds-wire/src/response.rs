//! Interpretation of the server's reply to a login message.

use crate::error::ProtocolError;
use crate::message::{LoginAck, ServerMessage};
use crate::prelude::*;
use crate::token::{Token, TokenType, parse_token_stream};

/// Successful login reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    /// The server's acknowledgment.
    pub ack: LoginAck,
    /// Informational messages sent alongside it.
    pub info: Vec<ServerMessage>,
}

impl LoginResponse {
    /// Parse and interpret a raw login reply.
    pub fn parse(src: &[u8]) -> Result<Self, ProtocolError> {
        let tokens = parse_token_stream(src)?;
        Self::from_tokens(&tokens)
    }

    /// Interpret the tokens of a login reply.
    ///
    /// The first ERROR rejects the login. Exactly one LOGINACK must be
    /// present otherwise. Tokens of other types are skipped.
    pub fn from_tokens(tokens: &[Token]) -> Result<Self, ProtocolError> {
        tracing::debug!(tokens = tokens.len(), "interpreting login response");

        let mut errors = Vec::new();
        let mut info = Vec::new();
        let mut acks = Vec::new();

        for token in tokens {
            let mut payload = token.payload();
            match token.token_type() {
                Some(TokenType::Error) => {
                    let err = ServerMessage::decode(&mut payload)?;
                    tracing::warn!(
                        number = err.number,
                        class = err.class,
                        state = err.state,
                        message = %err.message,
                        "server error during login"
                    );
                    errors.push(err);
                }
                Some(TokenType::Info) => {
                    let msg = ServerMessage::decode(&mut payload)?;
                    tracing::debug!(
                        number = msg.number,
                        message = %msg.message,
                        "server info message"
                    );
                    info.push(msg);
                }
                Some(TokenType::LoginAck) => acks.push(LoginAck::decode(&mut payload)?),
                _ => {}
            }
        }

        if let Some(first) = errors.into_iter().next() {
            return Err(ProtocolError::LoginRejected(first));
        }

        match acks.len() {
            0 => Err(ProtocolError::NoLoginAck),
            1 => {
                let ack = acks.remove(0);
                tracing::info!(
                    version = %ack.tds_version,
                    interface = ack.interface,
                    prog_name = %ack.prog_name,
                    "login acknowledged"
                );
                Ok(Self { ack, info })
            }
            n => Err(ProtocolError::MultipleLoginAcks(n)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::codec::{write_b_varchar, write_us_varchar};
    use crate::token::build_token_stream;
    use crate::version::TdsVersion;
    use bytes::{BufMut, Bytes, BytesMut};

    fn message_token(kind: TokenType, number: i32, text: &str) -> Token {
        let mut buf = BytesMut::new();
        buf.put_i32_le(number);
        buf.put_u8(1);
        buf.put_u8(if kind == TokenType::Error { 14 } else { 0 });
        write_us_varchar(&mut buf, text);
        write_b_varchar(&mut buf, "DB01");
        write_b_varchar(&mut buf, "");
        buf.put_i32_le(1);
        Token::variable(kind as u8, buf.freeze())
    }

    fn ack_token() -> Token {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        buf.put_slice(&TdsVersion::V7_4.to_wire());
        write_b_varchar(&mut buf, "Microsoft SQL Server");
        buf.put_slice(&[16, 0, 0x10, 0x7A]);
        Token::variable(TokenType::LoginAck as u8, buf.freeze())
    }

    fn env_change_token() -> Token {
        Token::variable(TokenType::EnvChange as u8, Bytes::from_static(&[0x01, 0x00, 0x00]))
    }

    #[test]
    fn test_login_acknowledged() {
        let tokens = vec![
            env_change_token(),
            message_token(TokenType::Info, 5701, "Changed database context to 'master'."),
            ack_token(),
        ];
        let response = LoginResponse::from_tokens(&tokens).unwrap();
        assert_eq!(response.ack.tds_version, TdsVersion::V7_4);
        assert_eq!(response.info.len(), 1);
        assert_eq!(response.info[0].number, 5701);
    }

    #[test]
    fn test_first_error_rejects() {
        let tokens = vec![
            message_token(TokenType::Error, 18456, "Login failed for user 'sa'."),
            message_token(TokenType::Error, 4060, "Cannot open database."),
            ack_token(),
        ];
        match LoginResponse::from_tokens(&tokens).unwrap_err() {
            ProtocolError::LoginRejected(err) => assert_eq!(err.number, 18456),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_ack() {
        let tokens = vec![env_change_token()];
        assert!(matches!(
            LoginResponse::from_tokens(&tokens),
            Err(ProtocolError::NoLoginAck)
        ));
    }

    #[test]
    fn test_multiple_acks() {
        let tokens = vec![ack_token(), ack_token()];
        assert!(matches!(
            LoginResponse::from_tokens(&tokens),
            Err(ProtocolError::MultipleLoginAcks(2))
        ));
    }

    #[test]
    fn test_parse_wire() {
        let wire = build_token_stream(&[ack_token()]).unwrap();
        let response = LoginResponse::parse(&wire).unwrap();
        assert_eq!(response.ack.prog_name, "Microsoft SQL Server");
    }

    #[test]
    fn test_parse_truncated() {
        let wire = build_token_stream(&[ack_token()]).unwrap();
        assert!(LoginResponse::parse(&wire[..wire.len() - 1]).unwrap_err().is_framing());
    }
}
