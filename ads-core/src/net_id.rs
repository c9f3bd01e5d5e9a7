//! AMS addressing types

use crate::error::{AdsError, AdsResult};
use std::fmt;
use std::str::FromStr;

/// An AMS port number
pub type AmsPort = u16;

/// Well-known AMS ports
pub mod ports {
    /// TwinCAT system service
    pub const SYSTEM_SERVICE: u16 = 10000;
    /// First TwinCAT 3 PLC runtime
    pub const TC3_PLC1: u16 = 851;
}

/// 6-byte logical address of an AMS node
///
/// The textual form is six decimal octets joined by `.`, e.g.
/// `10.20.30.40.1.1`. Equality is by byte content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmsNetId([u8; 6]);

impl AmsNetId {
    /// Create a net id from its 6 raw bytes
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Create a net id from a byte slice
    ///
    /// # Errors
    /// Returns a configuration error if the slice is not exactly 6 bytes
    pub fn from_slice(bytes: &[u8]) -> AdsResult<Self> {
        if bytes.len() != 6 {
            return Err(AdsError::Config(format!(
                "AMS Net ID must be 6 bytes, got {}",
                bytes.len()
            )));
        }
        let mut id = [0u8; 6];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for AmsNetId {
    type Err = AdsError;

    fn from_str(s: &str) -> AdsResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 6 {
            return Err(AdsError::Config(format!(
                "AMS Net ID must have 6 octets, got {} in {:?}",
                parts.len(),
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = part.parse::<u8>().map_err(|_| {
                AdsError::Config(format!("Invalid AMS Net ID octet {:?} in {:?}", part, s))
            })?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for AmsNetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// An AMS routing endpoint: net id plus port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmsAddress {
    pub net_id: AmsNetId,
    pub port: AmsPort,
}

impl AmsAddress {
    /// Create a new AMS address
    pub fn new(net_id: AmsNetId, port: AmsPort) -> Self {
        Self { net_id, port }
    }
}

impl fmt::Display for AmsAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net_id, self.port)
    }
}
