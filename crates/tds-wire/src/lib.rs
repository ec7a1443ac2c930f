//! # tds-wire
//!
//! Wire-format codec for the client side of the MS-TDS (Tabular Data Stream)
//! protocol used by Microsoft SQL Server.
//!
//! The crate turns login configuration into an exact login message and
//! frames token streams in both directions. It is IO-agnostic: transport,
//! packet envelopes, retries and SQL execution belong to the caller.
//!
//! ## Features
//!
//! - `std` (default): Enable standard library support
//! - `alloc`: Enable allocation without full std (requires `alloc` crate)
//!
//! ## Example
//!
//! ```rust
//! use tds_wire::{LoginConfig, LoginRecord, TdsVersion};
//!
//! let config = LoginConfig::new()
//!     .with_tds_version(TdsVersion::V7_2)
//!     .with_hostname("app-01")
//!     .with_sql_auth("sa", "secret")
//!     .with_database("master");
//!
//! let packet = config.encode()?;
//! assert_eq!(u16::from_le_bytes([packet[0], packet[1]]) as usize, packet.len());
//!
//! let record = LoginRecord::decode(&packet)?;
//! assert_eq!(record.config.password, "secret");
//! # Ok::<(), tds_wire::ProtocolError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

#[cfg(all(feature = "alloc", not(feature = "std")))]
extern crate alloc;

pub mod codec;
pub mod error;
pub mod login7;
pub mod message;
pub mod password;
pub mod response;
pub mod token;
pub mod var_data;
pub mod version;

mod prelude;

pub use codec::{decode_utf16, encode_code_points, encode_utf16};
pub use error::ProtocolError;
pub use login7::{
    LoginConfig, LoginRecord, OptionFlags1, OptionFlags2, OptionFlags3, TypeFlags,
    build_login_packet,
};
pub use message::{LoginAck, ProgramVersion, ServerMessage};
pub use password::{deobfuscate, obfuscate};
pub use response::LoginResponse;
pub use token::{
    Token, TokenClass, TokenReader, TokenType, build_token_stream, parse_token_stream,
};
pub use var_data::{Placement, VarField, layout};
pub use version::TdsVersion;
