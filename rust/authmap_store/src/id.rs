//! Fixed-width opaque identifiers for principals and resources.
//!
//! An [`Id`] is a 64-bit value rendered as exactly 16 lowercase-hex bytes.
//! The fixed width matters: key-level predicate tests slice composite keys
//! at byte offsets instead of parsing delimiters. Zero is the invalid
//! sentinel and cannot be encoded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Byte width of the fixed encoding.
pub const ENCODED_ID_LEN: usize = 16;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Zero identifiers are placeholders and never refer to anything.
    pub fn valid(&self) -> bool {
        self.0 != 0
    }

    /// Fixed-width encoding, `None` for the invalid zero identifier.
    pub fn encode(&self) -> Option<[u8; ENCODED_ID_LEN]> {
        if !self.valid() {
            return None;
        }
        let mut out = [0u8; ENCODED_ID_LEN];
        let mut v = self.0;
        for slot in out.iter_mut().rev() {
            *slot = HEX_DIGITS[(v & 0xF) as usize];
            v >>= 4;
        }
        Some(out)
    }
}

impl From<u64> for Id {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("identifiers are exactly {ENCODED_ID_LEN} hex characters")]
pub struct ParseIdError;

impl FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ENCODED_ID_LEN {
            return Err(ParseIdError);
        }
        u64::from_str_radix(s, 16).map(Id).map_err(|_| ParseIdError)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
