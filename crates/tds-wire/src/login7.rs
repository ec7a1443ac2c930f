//! Login message construction and decoding.
//!
//! The login message is sent once per connection, before any token traffic.
//!
//! ## Message Structure
//!
//! | Offset | Size | Field                                          |
//! |--------|------|------------------------------------------------|
//! | 0      | 4    | Total length (u16 LE, patched last) + 2 zeros  |
//! | 4      | 4    | TDS version (big-endian)                       |
//! | 8      | 16   | Packet size, program version, PID, conn id     |
//! | 24     | 4    | OptionFlags1, OptionFlags2, TypeFlags, OptionFlags3 |
//! | 28     | 8    | Timezone, LCID                                 |
//! | 36     | ...  | Variable-data block (see [`crate::var_data`])  |
//!
//! ## Security Note
//!
//! The password is obfuscated (not encrypted). Always use TLS encryption for
//! the connection.

use core::fmt;

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::password::{deobfuscate, obfuscate};
use crate::prelude::*;
use crate::var_data::{VarDataReader, VarField, layout};
use crate::version::TdsVersion;

/// Size of the fixed portion preceding the variable-data block.
pub const LOGIN_FIXED_SIZE: usize = 36;

/// Offset of the first variable-data byte for the standard field set.
pub const LOGIN_DATA_OFFSET: usize = 94;

/// Largest message the 16-bit length field can describe.
pub const MAX_LOGIN_LENGTH: usize = u16::MAX as usize;

/// Client id sent when none is configured.
pub const DEFAULT_CLIENT_ID: [u8; 6] = [0xFA, 0xCA, 0xDE, 0xFA, 0xCA, 0xDE];

const HOSTNAME_FALLBACK: &str = "unknown-tds-client";
const CLIENT_NAME: &str = "tds-wire";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flags1: u8 {
        const BYTE_ORDER = 0x80;
        const CHAR_TYPE = 0x40;
        // 0x30: float type, always IEEE 754 (0)
        const DUMP_LOAD = 0x08;
        const USE_DB_WARNINGS = 0x04;
        const FAIL_IF_NO_DB = 0x02;
        const SET_LANG = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flags2: u8 {
        const FAIL_IF_NO_LANGUAGE = 0x80;
        const ODBC = 0x40;
        const INTEGRATED_SECURITY = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Types: u8 {
        const SQL_TYPE = 0x80;
        const OLEDB = 0x08;
        const READ_ONLY = 0x04;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flags3: u8 {
        const CHANGE_PASSWORD = 0x80;
        const BINARY_XML = 0x40;
        const USER_INSTANCE = 0x20;
        const UNKNOWN_COLLATION = 0x10;
        const EXTENSION = 0x08;
    }
}

/// Login option flags 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionFlags1 {
    /// Big-endian byte order.
    pub byte_order: bool,
    /// EBCDIC character set.
    pub char_type: bool,
    /// Dump/load off.
    pub dump_load: bool,
    /// Warn on database change.
    pub use_db_warnings: bool,
    /// Fail the login if the initial database cannot be used.
    pub fail_if_no_db: bool,
    /// Warn on language change.
    pub set_lang: bool,
}

impl OptionFlags1 {
    /// Convert to byte.
    #[must_use]
    pub fn to_byte(&self) -> u8 {
        let mut bits = Flags1::empty();
        bits.set(Flags1::BYTE_ORDER, self.byte_order);
        bits.set(Flags1::CHAR_TYPE, self.char_type);
        bits.set(Flags1::DUMP_LOAD, self.dump_load);
        bits.set(Flags1::USE_DB_WARNINGS, self.use_db_warnings);
        bits.set(Flags1::FAIL_IF_NO_DB, self.fail_if_no_db);
        bits.set(Flags1::SET_LANG, self.set_lang);
        bits.bits()
    }

    /// Decode from byte. Float type bits are ignored.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        let bits = Flags1::from_bits_truncate(byte);
        Self {
            byte_order: bits.contains(Flags1::BYTE_ORDER),
            char_type: bits.contains(Flags1::CHAR_TYPE),
            dump_load: bits.contains(Flags1::DUMP_LOAD),
            use_db_warnings: bits.contains(Flags1::USE_DB_WARNINGS),
            fail_if_no_db: bits.contains(Flags1::FAIL_IF_NO_DB),
            set_lang: bits.contains(Flags1::SET_LANG),
        }
    }
}

/// Login option flags 2.
///
/// The user-type bits are always zero (regular user).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionFlags2 {
    /// Fail the login if the language cannot be set.
    pub fail_if_no_language: bool,
    /// ODBC driver.
    pub odbc: bool,
    /// Integrated security.
    pub integrated_security: bool,
}

impl OptionFlags2 {
    /// Convert to byte.
    #[must_use]
    pub fn to_byte(&self) -> u8 {
        let mut bits = Flags2::empty();
        bits.set(Flags2::FAIL_IF_NO_LANGUAGE, self.fail_if_no_language);
        bits.set(Flags2::ODBC, self.odbc);
        bits.set(Flags2::INTEGRATED_SECURITY, self.integrated_security);
        bits.bits()
    }

    /// Decode from byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        let bits = Flags2::from_bits_truncate(byte);
        Self {
            fail_if_no_language: bits.contains(Flags2::FAIL_IF_NO_LANGUAGE),
            odbc: bits.contains(Flags2::ODBC),
            integrated_security: bits.contains(Flags2::INTEGRATED_SECURITY),
        }
    }
}

/// Login type flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFlags {
    /// T-SQL (the only SQL type bit in use).
    pub sql_type: bool,
    /// OLE DB driver. Requires TDS 7.2.
    pub oledb: bool,
    /// Read-only application intent.
    pub read_only: bool,
}

impl TypeFlags {
    /// Convert to byte.
    #[must_use]
    pub fn to_byte(&self) -> u8 {
        let mut bits = Types::empty();
        bits.set(Types::SQL_TYPE, self.sql_type);
        bits.set(Types::OLEDB, self.oledb);
        bits.set(Types::READ_ONLY, self.read_only);
        bits.bits()
    }

    /// Decode from byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        let bits = Types::from_bits_truncate(byte);
        Self {
            sql_type: bits.contains(Types::SQL_TYPE),
            oledb: bits.contains(Types::OLEDB),
            read_only: bits.contains(Types::READ_ONLY),
        }
    }
}

/// Login option flags 3. Sent from TDS 7.2; earlier versions carry a
/// reserved zero byte in its place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionFlags3 {
    /// Change password during login.
    pub change_password: bool,
    /// Send XML as binary XML.
    pub binary_xml: bool,
    /// Spawn a user instance.
    pub user_instance: bool,
    /// Unknown collation handling. Requires TDS 7.3.
    pub unknown_collation_handling: bool,
    /// Feature extension block present. Requires TDS 7.4.
    pub extension: bool,
}

impl OptionFlags3 {
    /// Convert to byte.
    #[must_use]
    pub fn to_byte(&self) -> u8 {
        let mut bits = Flags3::empty();
        bits.set(Flags3::CHANGE_PASSWORD, self.change_password);
        bits.set(Flags3::BINARY_XML, self.binary_xml);
        bits.set(Flags3::USER_INSTANCE, self.user_instance);
        bits.set(Flags3::UNKNOWN_COLLATION, self.unknown_collation_handling);
        bits.set(Flags3::EXTENSION, self.extension);
        bits.bits()
    }

    /// Decode from byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        let bits = Flags3::from_bits_truncate(byte);
        Self {
            change_password: bits.contains(Flags3::CHANGE_PASSWORD),
            binary_xml: bits.contains(Flags3::BINARY_XML),
            user_instance: bits.contains(Flags3::USER_INSTANCE),
            unknown_collation_handling: bits.contains(Flags3::UNKNOWN_COLLATION),
            extension: bits.contains(Flags3::EXTENSION),
        }
    }

    fn is_empty(&self) -> bool {
        self.to_byte() == 0
    }
}

/// Login configuration.
///
/// Read-only input to [`LoginConfig::encode`]. `Debug` output redacts both
/// passwords.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginConfig {
    /// TDS version.
    pub tds_version: TdsVersion,
    /// Requested packet size.
    pub packet_size: u32,
    /// Client program (driver) version.
    pub client_prog_version: u32,
    /// Client process ID.
    pub client_pid: u32,
    /// Connection ID.
    pub connection_id: u32,
    /// Option flags 1.
    pub option_flags1: OptionFlags1,
    /// Option flags 2.
    pub option_flags2: OptionFlags2,
    /// Type flags.
    pub type_flags: TypeFlags,
    /// Option flags 3.
    pub option_flags3: OptionFlags3,
    /// Client timezone offset in minutes.
    pub client_timezone: i32,
    /// Client LCID (locale ID).
    pub client_lcid: u32,
    /// Hostname (client machine name).
    pub hostname: String,
    /// Username for SQL authentication.
    pub username: String,
    /// Password for SQL authentication.
    pub password: String,
    /// Application name.
    pub app_name: String,
    /// Server name.
    pub server_name: String,
    /// Client library (driver) name.
    pub library_name: String,
    /// Preferred language.
    pub language: String,
    /// Initial database.
    pub database: String,
    /// Client ID.
    pub client_id: [u8; 6],
    /// Database file to attach.
    pub attach_db_file: String,
    /// New password, sent with `change_password`.
    pub new_password: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        #[cfg(feature = "std")]
        let client_pid = std::process::id();
        #[cfg(not(feature = "std"))]
        let client_pid = 0;

        Self {
            tds_version: TdsVersion::default(),
            packet_size: 4096,
            client_prog_version: 0,
            client_pid,
            connection_id: 0,
            option_flags1: OptionFlags1 {
                use_db_warnings: true,
                fail_if_no_db: true,
                ..Default::default()
            },
            option_flags2: OptionFlags2 {
                fail_if_no_language: true,
                odbc: true,
                ..Default::default()
            },
            type_flags: TypeFlags::default(),
            option_flags3: OptionFlags3::default(),
            client_timezone: 0,
            client_lcid: 0x0409, // English (US)
            hostname: default_hostname(),
            username: String::new(),
            password: String::new(),
            app_name: String::from(CLIENT_NAME),
            server_name: String::new(),
            library_name: String::from(CLIENT_NAME),
            language: String::new(),
            database: String::new(),
            client_id: DEFAULT_CLIENT_ID,
            attach_db_file: String::new(),
            new_password: String::new(),
        }
    }
}

#[cfg(feature = "std")]
fn default_hostname() -> String {
    ["COMPUTERNAME", "HOSTNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| String::from(HOSTNAME_FALLBACK))
}

#[cfg(not(feature = "std"))]
fn default_hostname() -> String {
    String::from(HOSTNAME_FALLBACK)
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("tds_version", &self.tds_version)
            .field("packet_size", &self.packet_size)
            .field("client_prog_version", &self.client_prog_version)
            .field("client_pid", &self.client_pid)
            .field("connection_id", &self.connection_id)
            .field("option_flags1", &self.option_flags1)
            .field("option_flags2", &self.option_flags2)
            .field("type_flags", &self.type_flags)
            .field("option_flags3", &self.option_flags3)
            .field("client_timezone", &self.client_timezone)
            .field("client_lcid", &self.client_lcid)
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("app_name", &self.app_name)
            .field("server_name", &self.server_name)
            .field("library_name", &self.library_name)
            .field("language", &self.language)
            .field("database", &self.database)
            .field("client_id", &self.client_id)
            .field("attach_db_file", &self.attach_db_file)
            .field("new_password", &"[REDACTED]")
            .finish()
    }
}

impl LoginConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TDS version.
    #[must_use]
    pub fn with_tds_version(mut self, version: TdsVersion) -> Self {
        self.tds_version = version;
        self
    }

    /// Set SQL authentication credentials.
    #[must_use]
    pub fn with_sql_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self.option_flags2.integrated_security = false;
        self
    }

    /// Request a password change during login.
    #[must_use]
    pub fn with_new_password(mut self, new_password: impl Into<String>) -> Self {
        self.new_password = new_password.into();
        self.option_flags3.change_password = true;
        self
    }

    /// Set the database to connect to.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the hostname (client machine name).
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Set the server name.
    #[must_use]
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    /// Set the client library name.
    #[must_use]
    pub fn with_library_name(mut self, library_name: impl Into<String>) -> Self {
        self.library_name = library_name.into();
        self
    }

    /// Set the preferred language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the database file to attach.
    #[must_use]
    pub fn with_attach_db_file(mut self, path: impl Into<String>) -> Self {
        self.attach_db_file = path.into();
        self
    }

    /// Set the packet size.
    #[must_use]
    pub fn with_packet_size(mut self, packet_size: u32) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Set the connection ID.
    #[must_use]
    pub fn with_connection_id(mut self, connection_id: u32) -> Self {
        self.connection_id = connection_id;
        self
    }

    /// Set the client timezone offset in minutes.
    #[must_use]
    pub fn with_timezone(mut self, minutes: i32) -> Self {
        self.client_timezone = minutes;
        self
    }

    /// Set the client LCID.
    #[must_use]
    pub fn with_lcid(mut self, lcid: u32) -> Self {
        self.client_lcid = lcid;
        self
    }

    /// Set the client ID.
    #[must_use]
    pub fn with_client_id(mut self, client_id: [u8; 6]) -> Self {
        self.client_id = client_id;
        self
    }

    /// Enable read-only intent for readable secondary connections.
    #[must_use]
    pub fn with_read_only_intent(mut self, read_only: bool) -> Self {
        self.type_flags.read_only = read_only;
        self
    }

    /// Identify as an OLE DB client.
    #[must_use]
    pub fn with_oledb(mut self, oledb: bool) -> Self {
        self.type_flags.oledb = oledb;
        self
    }

    /// Check every option against the configured TDS version.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let flags3 = &self.option_flags3;
        let gates: [(bool, &'static str, fn(TdsVersion) -> bool, TdsVersion); 6] = [
            (
                self.type_flags.oledb,
                "OLE DB",
                TdsVersion::supports_oledb,
                TdsVersion::V7_2,
            ),
            (
                flags3.change_password,
                "password change",
                TdsVersion::supports_option_flags3,
                TdsVersion::V7_2,
            ),
            (
                flags3.binary_xml,
                "binary XML",
                TdsVersion::supports_option_flags3,
                TdsVersion::V7_2,
            ),
            (
                flags3.user_instance,
                "user instance",
                TdsVersion::supports_option_flags3,
                TdsVersion::V7_2,
            ),
            (
                flags3.unknown_collation_handling,
                "unknown collation handling",
                TdsVersion::supports_unknown_collation_handling,
                TdsVersion::V7_3A,
            ),
            (
                flags3.extension,
                "feature extension",
                TdsVersion::supports_feature_extension,
                TdsVersion::V7_4,
            ),
        ];

        for (enabled, feature, supported, required) in gates {
            if enabled && !supported(self.tds_version) {
                return Err(ProtocolError::FeatureRequiresVersion {
                    feature,
                    required,
                    configured: self.tds_version,
                });
            }
        }
        Ok(())
    }

    fn var_fields(&self) -> Vec<VarField> {
        vec![
            VarField::text(&self.hostname),
            VarField::text(&self.username),
            VarField::half_length(obfuscate(&self.password)),
            VarField::text(&self.app_name),
            VarField::text(&self.server_name),
            // extension
            VarField::empty(),
            VarField::text(&self.library_name),
            VarField::bytes(Bytes::copy_from_slice(self.language.as_bytes())),
            VarField::text(&self.database),
            VarField::inline(Bytes::copy_from_slice(&self.client_id)),
            // SSPI
            VarField::empty(),
            VarField::text(&self.attach_db_file),
            VarField::half_length(obfuscate(&self.new_password)),
            // SSPI long length
            VarField::inline(Bytes::from_static(&[0, 0, 0, 0])),
        ]
    }

    /// Encode the login message.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        self.validate()?;

        let mut buf = BytesMut::with_capacity(LOGIN_DATA_OFFSET + 128);

        // Length, patched below
        buf.put_u32_le(0);

        buf.put_slice(&self.tds_version.to_wire());
        buf.put_u32_le(self.packet_size);
        buf.put_u32_le(self.client_prog_version);
        buf.put_u32_le(self.client_pid);
        buf.put_u32_le(self.connection_id);

        buf.put_u8(self.option_flags1.to_byte());
        buf.put_u8(self.option_flags2.to_byte());
        buf.put_u8(self.type_flags.to_byte());
        if self.tds_version.supports_option_flags3() {
            buf.put_u8(self.option_flags3.to_byte());
        } else {
            debug_assert!(self.option_flags3.is_empty());
            buf.put_u8(0);
        }

        buf.put_i32_le(self.client_timezone);
        buf.put_u32_le(self.client_lcid);

        let block = layout(&self.var_fields(), buf.len())?;
        buf.put_slice(&block);

        let length = buf.len();
        let wire_length = u16::try_from(length).map_err(|_| ProtocolError::PacketTooLarge {
            length,
            max: MAX_LOGIN_LENGTH,
        })?;
        buf[0..2].copy_from_slice(&wire_length.to_le_bytes());

        Ok(buf.freeze())
    }
}

/// Build a login message from `config`.
pub fn build_login_packet(config: &LoginConfig) -> Result<Bytes, ProtocolError> {
    config.encode()
}

/// A decoded login message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRecord {
    /// Length declared in the first two bytes.
    pub length: usize,
    /// Configuration carried by the message.
    pub config: LoginConfig,
    /// Raw extension field.
    pub extension: Vec<u8>,
    /// Raw SSPI field.
    pub sspi: Vec<u8>,
    /// SSPI long length.
    pub sspi_long_length: u32,
}

impl LoginRecord {
    /// Decode a login message.
    ///
    /// Passwords are deobfuscated. Text decodes lossily. Bytes past the
    /// declared length are ignored and no field may point into them.
    pub fn decode(src: &[u8]) -> Result<Self, ProtocolError> {
        if src.len() < LOGIN_FIXED_SIZE {
            return Err(ProtocolError::Truncated {
                needed: LOGIN_FIXED_SIZE,
                available: src.len(),
            });
        }

        let mut cursor = src;
        let length = cursor.get_u16_le() as usize;
        cursor.advance(2);
        if length > src.len() {
            return Err(ProtocolError::Truncated {
                needed: length,
                available: src.len(),
            });
        }

        let tds_version = TdsVersion::new(cursor.get_u32());
        let packet_size = cursor.get_u32_le();
        let client_prog_version = cursor.get_u32_le();
        let client_pid = cursor.get_u32_le();
        let connection_id = cursor.get_u32_le();
        let option_flags1 = OptionFlags1::from_byte(cursor.get_u8());
        let option_flags2 = OptionFlags2::from_byte(cursor.get_u8());
        let type_flags = TypeFlags::from_byte(cursor.get_u8());
        let option_flags3 = OptionFlags3::from_byte(cursor.get_u8());
        let client_timezone = cursor.get_i32_le();
        let client_lcid = cursor.get_u32_le();

        let mut fields = VarDataReader::new(&src[..length], LOGIN_FIXED_SIZE);
        let hostname = fields.read_text()?;
        let username = fields.read_text()?;
        let password = deobfuscate(fields.read_half_length()?);
        let app_name = fields.read_text()?;
        let server_name = fields.read_text()?;
        let extension = fields.read_bytes()?.to_vec();
        let library_name = fields.read_text()?;
        let language = String::from_utf8_lossy(fields.read_bytes()?).into_owned();
        let database = fields.read_text()?;
        let mut client_id = [0u8; 6];
        client_id.copy_from_slice(fields.read_inline(6)?);
        let sspi = fields.read_bytes()?.to_vec();
        let attach_db_file = fields.read_text()?;
        let new_password = deobfuscate(fields.read_half_length()?);
        let mut sspi_long = fields.read_inline(4)?;
        let sspi_long_length = sspi_long.get_u32_le();

        Ok(Self {
            length,
            config: LoginConfig {
                tds_version,
                packet_size,
                client_prog_version,
                client_pid,
                connection_id,
                option_flags1,
                option_flags2,
                type_flags,
                option_flags3,
                client_timezone,
                client_lcid,
                hostname,
                username,
                password,
                app_name,
                server_name,
                library_name,
                language,
                database,
                client_id,
                attach_db_file,
                new_password,
            },
            extension,
            sspi,
            sspi_long_length,
        })
    }
}
