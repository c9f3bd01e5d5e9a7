//! PSK key material
//!
//! TwinCAT derives the 32-byte pre-shared key from an identity/password
//! pair as `SHA-256(uppercase(identity) || password)`. A raw 32-byte key
//! and a 64-character hex form are also accepted. The identity goes onto
//! the wire exactly as supplied; only the derivation uppercases it.

use crate::error::{AdsError, AdsResult};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the pre-shared key in bytes
pub const PSK_KEY_LEN: usize = 32;

/// Identity and pre-shared key for the PSK authentication mode
#[derive(Clone, PartialEq, Eq)]
pub struct PskCredentials {
    identity: String,
    key: [u8; PSK_KEY_LEN],
}

impl PskCredentials {
    /// Create credentials from a raw 32-byte key
    ///
    /// # Errors
    /// Returns a configuration error if the identity is blank
    pub fn from_key(identity: impl Into<String>, key: [u8; PSK_KEY_LEN]) -> AdsResult<Self> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(AdsError::Config(
                "PSK identity must not be blank".to_string(),
            ));
        }
        Ok(Self { identity, key })
    }

    /// Create credentials from a 64-character hex key
    pub fn from_hex_key(identity: impl Into<String>, hex: &str) -> AdsResult<Self> {
        Self::from_key(identity, parse_hex_key(hex)?)
    }

    /// Derive the key from a password using the TwinCAT convention
    ///
    /// `key = SHA-256(uppercase(identity) || password)`. The stored
    /// identity keeps its original case.
    pub fn derive(identity: impl Into<String>, password: &str) -> AdsResult<Self> {
        let identity = identity.into();
        let mut hasher = Sha256::new();
        hasher.update(identity.to_uppercase().as_bytes());
        hasher.update(password.as_bytes());
        Self::from_key(identity, hasher.finalize().into())
    }

    /// Identity as sent on the wire
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The pre-shared key
    pub fn key(&self) -> &[u8; PSK_KEY_LEN] {
        &self.key
    }
}

impl fmt::Debug for PskCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print key material
        f.debug_struct("PskCredentials")
            .field("identity", &self.identity)
            .field("key", &"[redacted]")
            .finish()
    }
}

fn parse_hex_key(hex: &str) -> AdsResult<[u8; PSK_KEY_LEN]> {
    if hex.len() != PSK_KEY_LEN * 2 {
        return Err(AdsError::Config(format!(
            "PSK hex key must be {} characters, got {}",
            PSK_KEY_LEN * 2,
            hex.len()
        )));
    }

    let mut key = [0u8; PSK_KEY_LEN];
    for (i, byte) in key.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|_| AdsError::Config(format!("Invalid hex digit in PSK key: {:?}", pair)))?;
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_matches_convention() {
        let creds = PskCredentials::derive("my-client", "secret").unwrap();

        let mut hasher = Sha256::new();
        hasher.update(b"MY-CLIENT");
        hasher.update(b"secret");
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(creds.key(), &expected);
        // wire identity keeps its case
        assert_eq!(creds.identity(), "my-client");
    }

    #[test]
    fn test_derivation_is_case_insensitive_in_identity() {
        let lower = PskCredentials::derive("my-client", "secret").unwrap();
        let upper = PskCredentials::derive("MY-CLIENT", "secret").unwrap();
        assert_eq!(lower.key(), upper.key());
        assert_ne!(lower.identity(), upper.identity());
    }

    #[test]
    fn test_blank_identity_rejected() {
        assert!(PskCredentials::from_key("  ", [0u8; 32]).is_err());
        assert!(PskCredentials::derive("", "secret").is_err());
    }

    #[test]
    fn test_hex_key() {
        let hex = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
        let creds = PskCredentials::from_hex_key("plc", hex).unwrap();
        assert_eq!(creds.key()[0], 0x00);
        assert_eq!(creds.key()[31], 0x1F);

        assert!(PskCredentials::from_hex_key("plc", "abcd").is_err());
        assert!(PskCredentials::from_hex_key("plc", &"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let creds = PskCredentials::derive("plc", "secret").unwrap();
        let printed = format!("{:?}", creds);
        assert!(printed.contains("redacted"));
        assert!(!printed.contains("secret"));
    }
}
