//! 16-byte time-ordered identifiers.
//!
//! Layout: a 48-bit big-endian Unix-millisecond prefix followed by 80
//! random bits, so lexicographic byte order approximates creation
//! order. The byte form is the canonical serialization; the hex text
//! form exists for logs and display only. [`Id::ZERO`] is reserved and
//! means "unset" in optional positions.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from id parsing.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    #[error("invalid id: expected 16 bytes, got {len}")]
    InvalidLength { len: usize },
    #[error("invalid id: not a 32-char hex string")]
    InvalidText,
}

/// A 16-byte time-ordered unique identifier.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id([u8; 16]);

impl Id {
    /// The reserved all-zero id, meaning "unset".
    pub const ZERO: Id = Id([0u8; 16]);

    /// Generate a fresh id. Never requires coordination: the prefix is
    /// the current wall clock in milliseconds, the suffix is random.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let suffix: [u8; 10] = rand::rng().random();

        let mut bytes = [0u8; 16];
        bytes[..6].copy_from_slice(&millis.to_be_bytes()[2..8]);
        bytes[6..].copy_from_slice(&suffix);
        Id(bytes)
    }

    /// Canonical byte form.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parse the canonical byte form. Fails on any length other than 16.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidLength { len: bytes.len() })?;
        Ok(Id(arr))
    }

    /// Whether this is the reserved "unset" id.
    pub fn is_zero(&self) -> bool {
        *self == Id::ZERO
    }

    /// Millisecond timestamp encoded in the prefix.
    pub fn timestamp_millis(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf[2..8].copy_from_slice(&self.0[..6]);
        u64::from_be_bytes(buf)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.is_ascii() {
            return Err(IdError::InvalidText);
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| IdError::InvalidText)?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| IdError::InvalidText)?;
        }
        Ok(Id(bytes))
    }
}
