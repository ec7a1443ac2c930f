//! TDS protocol version definitions.
//!
//! Login options are gated on the negotiated protocol version. The helpers on
//! [`TdsVersion`] answer "may this option be sent" questions for the login
//! builder, which turns a `false` answer into a configuration error.

use core::fmt;

/// TDS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TdsVersion(u32);

impl TdsVersion {
    /// TDS 7.0 (SQL Server 7.0)
    pub const V7_0: Self = Self(0x70000000);

    /// TDS 7.1 (SQL Server 2000)
    pub const V7_1: Self = Self(0x71000000);

    /// TDS 7.1 Revision 1 (SQL Server 2000 SP1)
    pub const V7_1_REV1: Self = Self(0x71000001);

    /// TDS 7.2 (SQL Server 2005)
    pub const V7_2: Self = Self(0x72090002);

    /// TDS 7.3A (SQL Server 2008)
    pub const V7_3A: Self = Self(0x730A0003);

    /// TDS 7.3B (SQL Server 2008 R2)
    pub const V7_3B: Self = Self(0x730B0003);

    /// TDS 7.4 (SQL Server 2012+)
    pub const V7_4: Self = Self(0x74000004);

    /// TDS 8.0 (SQL Server 2022+ strict encryption mode)
    pub const V8_0: Self = Self(0x08000000);

    /// Create a version from its raw value.
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Get the raw version value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Big-endian wire representation used in the login header.
    #[must_use]
    pub const fn to_wire(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Check if this is TDS 8.0.
    #[must_use]
    pub const fn is_tds_8(self) -> bool {
        self.0 == Self::V8_0.0
    }

    /// Check whether this version is at least `other`.
    ///
    /// TDS 8.0 is encoded as `0x08000000`, numerically below every 7.x
    /// version, so it is ordered explicitly.
    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        match (self.is_tds_8(), other.is_tds_8()) {
            (true, _) => true,
            (false, true) => false,
            (false, false) => self.0 >= other.0,
        }
    }

    /// OptionFlags3 replaced a reserved byte in TDS 7.2.
    #[must_use]
    pub const fn supports_option_flags3(self) -> bool {
        self.at_least(Self::V7_2)
    }

    /// The OLE DB type flag is honored from TDS 7.2.
    #[must_use]
    pub const fn supports_oledb(self) -> bool {
        self.at_least(Self::V7_2)
    }

    /// Unknown collation handling was added in TDS 7.3.
    #[must_use]
    pub const fn supports_unknown_collation_handling(self) -> bool {
        self.at_least(Self::V7_3A)
    }

    /// The feature extension block was added in TDS 7.4.
    #[must_use]
    pub const fn supports_feature_extension(self) -> bool {
        self.at_least(Self::V7_4)
    }

    /// Parse a version such as `"7.2"`, `"7.3b"` or `"8"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "7.0" => Some(Self::V7_0),
            "7.1" => Some(Self::V7_1),
            "7.2" => Some(Self::V7_2),
            "7.3" | "7.3a" => Some(Self::V7_3A),
            "7.3b" => Some(Self::V7_3B),
            "7.4" => Some(Self::V7_4),
            "8.0" | "8" => Some(Self::V8_0),
            _ => None,
        }
    }

    /// Major version: 7 for every 7.x version, 8 for TDS 8.0.
    #[must_use]
    pub const fn major(self) -> u8 {
        if self.is_tds_8() { 8 } else { 7 }
    }

    /// Minor version, e.g. 3 for TDS 7.3.
    #[must_use]
    pub const fn minor(self) -> u8 {
        match self.0 {
            0x08000000 => 0,
            // 7.x keeps the sub-version in the low nibble of the first byte
            v => ((v >> 24) & 0x0F) as u8,
        }
    }

    /// Revision suffix of the two TDS 7.3 variants.
    #[must_use]
    pub const fn revision_suffix(self) -> Option<char> {
        match self.0 {
            0x730A0003 => Some('A'),
            0x730B0003 => Some('B'),
            _ => None,
        }
    }
}

impl Default for TdsVersion {
    fn default() -> Self {
        Self::V7_4
    }
}

impl fmt::Display for TdsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision_suffix() {
            Some(suffix) => write!(f, "TDS {}.{}{}", self.major(), self.minor(), suffix),
            None => write!(f, "TDS {}.{}", self.major(), self.minor()),
        }
    }
}

impl From<u32> for TdsVersion {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<TdsVersion> for u32 {
    fn from(version: TdsVersion) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_least() {
        assert!(TdsVersion::V7_4.at_least(TdsVersion::V7_2));
        assert!(TdsVersion::V7_2.at_least(TdsVersion::V7_2));
        assert!(!TdsVersion::V7_1.at_least(TdsVersion::V7_2));
        assert!(TdsVersion::V8_0.at_least(TdsVersion::V7_4));
        assert!(!TdsVersion::V7_4.at_least(TdsVersion::V8_0));
    }

    #[test]
    fn test_feature_gates() {
        assert!(!TdsVersion::V7_1_REV1.supports_option_flags3());
        assert!(TdsVersion::V7_2.supports_option_flags3());
        assert!(!TdsVersion::V7_2.supports_unknown_collation_handling());
        assert!(TdsVersion::V7_3B.supports_unknown_collation_handling());
        assert!(!TdsVersion::V7_3B.supports_feature_extension());
        assert!(TdsVersion::V8_0.supports_feature_extension());
    }

    #[test]
    fn test_wire_is_big_endian() {
        assert_eq!(TdsVersion::V7_2.to_wire(), [0x72, 0x09, 0x00, 0x02]);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(TdsVersion::parse(" 7.3B "), Some(TdsVersion::V7_3B));
        assert_eq!(TdsVersion::parse("9.0"), None);
        assert_eq!(TdsVersion::V7_1.to_string(), "TDS 7.1");
        assert_eq!(TdsVersion::V7_3A.to_string(), "TDS 7.3A");
        assert_eq!(TdsVersion::V8_0.to_string(), "TDS 8.0");
    }
}
