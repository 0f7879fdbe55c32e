use crate::error::{DlmsError, DlmsResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static EXTENDED_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:\*(\d{1,3}))?$")
        .unwrap_or_else(|e| unreachable!("static OBIS pattern: {e}"))
});

/// OBIS (Object Identification System) code, the logical name of a COSEM object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Create an OBIS code from its six value groups
    ///
    /// # Arguments
    ///
    /// * `a` - Media
    /// * `b` - Channel
    /// * `c` - Physical value
    /// * `d` - Measurement type
    /// * `e` - Tariff
    /// * `f` - Billing period
    pub fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    /// Build from the 6-byte octet string carried on the wire
    pub fn from_slice(bytes: &[u8]) -> DlmsResult<Self> {
        let bytes: [u8; 6] = bytes.try_into().map_err(|_| {
            DlmsError::InvalidData(format!(
                "Logical name must be 6 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Parse an OBIS code from its textual form
    ///
    /// Supports `"1.0.1.8.0.255"` and `"1-0:1.8.0*255"` (F defaults to 255
    /// when the `*F` group is omitted).
    pub fn from_string(s: &str) -> DlmsResult<Self> {
        let s = s.trim();
        Self::parse_dot_format(s)
            .or_else(|_| Self::parse_extended_format(s))
            .map_err(|_| DlmsError::InvalidData(format!("Invalid OBIS code format: {}", s)))
    }

    fn parse_dot_format(s: &str) -> DlmsResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 6 {
            return Err(DlmsError::InvalidData("Expected 6 dot-separated values".to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = part
                .trim()
                .parse::<u8>()
                .map_err(|_| DlmsError::InvalidData(format!("Invalid byte value: {}", part)))?;
        }

        Ok(Self { bytes })
    }

    fn parse_extended_format(s: &str) -> DlmsResult<Self> {
        let caps = EXTENDED_FORMAT
            .captures(s)
            .ok_or_else(|| DlmsError::InvalidData("Expected A-B:C.D.E*F".to_string()))?;

        let mut bytes = [255u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            if let Some(group) = caps.get(i + 1) {
                *byte = group.as_str().parse::<u8>().map_err(|_| {
                    DlmsError::InvalidData(format!("Invalid byte value: {}", group.as_str()))
                })?;
            }
        }

        Ok(Self { bytes })
    }

    /// Value groups as a byte array reference
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    /// Value groups as an owned byte array
    pub fn to_bytes(&self) -> [u8; 6] {
        self.bytes
    }
}

impl FromStr for ObisCode {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2],
            self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}
