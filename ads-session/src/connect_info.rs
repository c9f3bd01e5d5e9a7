//! TlsConnectInfo codec
//!
//! Directly after the TLS handshake, Secure ADS peers exchange a single
//! `TlsConnectInfo` request/response pair. The message is little-endian,
//! 64 bytes plus optional credentials, with string fields in the peer's
//! ANSI code page (Windows-1252 in practice):
//!
//! ```text
//! off  size  field
//!  0    2   total_length   u16, 64..=512
//!  2    2   flags          u16 bitfield
//!  4    1   version        = 1
//!  5    1   error
//!  6    6   ams_net_id
//! 12    1   user_len
//! 13    1   pwd_len
//! 14   18   reserved       zero
//! 32   32   hostname       null-padded
//! 64   var  username
//!      var  password
//! ```

use crate::error::{AdsError, AdsResult};
use ads_core::AmsNetId;
use bytes::{BufMut, Bytes, BytesMut};
use encoding_rs::WINDOWS_1252;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Size of the fixed part of a TlsConnectInfo message
pub const CONNECT_INFO_BASE_SIZE: usize = 64;

/// Largest permitted TlsConnectInfo message
pub const CONNECT_INFO_MAX_SIZE: usize = 512;

/// Size of the fixed hostname field
pub const HOSTNAME_FIELD_LEN: usize = 32;

const CONNECT_INFO_VERSION: u8 = 1;

/// Flag word of a TlsConnectInfo message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlsConnectFlags(u16);

impl TlsConnectFlags {
    /// Message is a response
    pub const RESPONSE: Self = Self(0x0001);
    /// Peer grants AMS communication
    pub const AMS_ALLOWED: Self = Self(0x0002);
    /// Message carries server information
    pub const SERVER_INFO: Self = Self(0x0004);
    /// Certificate stems from the peer's own file store
    pub const OWN_FILE: Self = Self(0x0008);
    /// Self-signed certificate authentication
    pub const SELF_SIGNED: Self = Self(0x0010);
    /// Register the route under the caller's IP address
    pub const IP_ADDR: Self = Self(0x0020);
    /// Skip the certificate common-name check
    pub const IGNORE_CN: Self = Self(0x0040);
    /// Request route registration on the peer
    pub const ADD_REMOTE: Self = Self(0x0080);

    /// Empty flag set
    pub fn empty() -> Self {
        Self(0)
    }

    /// Create from the raw wire value
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Get the raw wire value
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Check whether all bits of `other` are set
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TlsConnectFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TlsConnectFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Error code of a TlsConnectInfo response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsConnectError {
    NoError = 0,
    /// Protocol version not supported by the peer
    Version = 1,
    /// Certificate common name does not match
    CnMismatch = 2,
    /// Certificate unknown to the peer
    UnknownCert = 3,
    /// Credentials rejected
    UnknownUser = 4,
}

impl TlsConnectError {
    /// Get the wire id
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Get the error from its wire id
    pub fn from_id(id: u8) -> AdsResult<Self> {
        match id {
            0 => Ok(TlsConnectError::NoError),
            1 => Ok(TlsConnectError::Version),
            2 => Ok(TlsConnectError::CnMismatch),
            3 => Ok(TlsConnectError::UnknownCert),
            4 => Ok(TlsConnectError::UnknownUser),
            _ => Err(AdsError::Protocol(format!(
                "Unknown TlsConnectInfo error code: {}",
                id
            ))),
        }
    }

    /// Human-readable error name
    pub fn name(&self) -> &'static str {
        match self {
            TlsConnectError::NoError => "NoError",
            TlsConnectError::Version => "Version",
            TlsConnectError::CnMismatch => "CnMismatch",
            TlsConnectError::UnknownCert => "UnknownCert",
            TlsConnectError::UnknownUser => "UnknownUser",
        }
    }
}

impl fmt::Display for TlsConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Route-registration credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the password
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl Credentials {
    /// Create new credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// TlsConnectInfo handshake message
///
/// Credentials are present iff both length bytes on the wire are
/// non-zero; server responses never carry credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConnectInfo {
    pub flags: TlsConnectFlags,
    pub error: TlsConnectError,
    pub net_id: AmsNetId,
    pub hostname: String,
    pub credentials: Option<Credentials>,
}

impl TlsConnectInfo {
    /// Build a request message
    pub fn request(
        flags: TlsConnectFlags,
        net_id: AmsNetId,
        hostname: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            flags,
            error: TlsConnectError::NoError,
            net_id,
            hostname: hostname.into(),
            credentials,
        }
    }

    /// Encode the message to its wire form
    ///
    /// # Errors
    /// Returns an error if a string field cannot be represented in
    /// Windows-1252, a credential field is empty or longer than 255
    /// bytes, or the total length would exceed 512 bytes
    pub fn encode(&self) -> AdsResult<Bytes> {
        let hostname = encode_win1252(&self.hostname, "hostname")?;

        let (username, password) = match &self.credentials {
            Some(c) => {
                let user = encode_win1252(&c.username, "username")?;
                let pwd = encode_win1252(&c.password, "password")?;
                if user.is_empty() || pwd.is_empty() {
                    return Err(AdsError::InvalidData(
                        "Credentials require a non-empty username and password".to_string(),
                    ));
                }
                if user.len() > 255 || pwd.len() > 255 {
                    return Err(AdsError::InvalidData(
                        "Credential fields are limited to 255 bytes".to_string(),
                    ));
                }
                (user, pwd)
            }
            None => (Vec::new(), Vec::new()),
        };

        let length = CONNECT_INFO_BASE_SIZE + username.len() + password.len();
        if length > CONNECT_INFO_MAX_SIZE {
            return Err(AdsError::InvalidData(format!(
                "TlsConnectInfo length {} exceeds maximum of {}",
                length, CONNECT_INFO_MAX_SIZE
            )));
        }

        let mut buf = BytesMut::with_capacity(length);
        buf.put_u16_le(length as u16);
        buf.put_u16_le(self.flags.bits());
        buf.put_u8(CONNECT_INFO_VERSION);
        buf.put_u8(self.error.id());
        buf.put_slice(self.net_id.as_bytes());
        buf.put_u8(username.len() as u8);
        buf.put_u8(password.len() as u8);
        buf.put_bytes(0, 18);

        // hostname is truncated or null-padded to exactly 32 bytes
        let hostname_len = hostname.len().min(HOSTNAME_FIELD_LEN);
        buf.put_slice(&hostname[..hostname_len]);
        buf.put_bytes(0, HOSTNAME_FIELD_LEN - hostname_len);

        buf.put_slice(&username);
        buf.put_slice(&password);

        debug_assert_eq!(buf.len(), length);
        Ok(buf.freeze())
    }

    /// Decode a message from bytes
    ///
    /// # Returns
    /// The decoded message and the number of bytes consumed (always the
    /// declared length)
    ///
    /// # Errors
    /// Any violation of the wire invariants is a hard protocol error: a
    /// declared length outside `[64, 512]`, fewer readable bytes than
    /// declared, a credential length byte pair where only one side is
    /// non-zero, or a length that does not match the credential lengths
    pub fn decode(data: &[u8]) -> AdsResult<(Self, usize)> {
        if data.len() < CONNECT_INFO_BASE_SIZE {
            return Err(AdsError::Protocol(format!(
                "TlsConnectInfo too short: expected at least {}, got {}",
                CONNECT_INFO_BASE_SIZE,
                data.len()
            )));
        }

        let length = u16::from_le_bytes([data[0], data[1]]) as usize;
        if !(CONNECT_INFO_BASE_SIZE..=CONNECT_INFO_MAX_SIZE).contains(&length) {
            return Err(AdsError::Protocol(format!(
                "TlsConnectInfo length out of range: {}",
                length
            )));
        }
        if data.len() < length {
            return Err(AdsError::Protocol(format!(
                "TlsConnectInfo truncated: declared {}, got {}",
                length,
                data.len()
            )));
        }

        let flags = TlsConnectFlags::from_bits(u16::from_le_bytes([data[2], data[3]]));
        let version = data[4];
        if version != CONNECT_INFO_VERSION {
            return Err(AdsError::Protocol(format!(
                "Unsupported TlsConnectInfo version: {}",
                version
            )));
        }
        let error = TlsConnectError::from_id(data[5])?;
        let net_id = AmsNetId::from_slice(&data[6..12])?;

        let user_len = data[12] as usize;
        let pwd_len = data[13] as usize;
        if (user_len > 0) != (pwd_len > 0) {
            return Err(AdsError::Protocol(format!(
                "Inconsistent credential lengths: user {}, password {}",
                user_len, pwd_len
            )));
        }
        if CONNECT_INFO_BASE_SIZE + user_len + pwd_len != length {
            return Err(AdsError::Protocol(format!(
                "TlsConnectInfo length {} does not match credential lengths {}+{}",
                length, user_len, pwd_len
            )));
        }

        let hostname = decode_win1252(trim_nul(&data[32..64]));

        let credentials = if user_len > 0 {
            let user_end = CONNECT_INFO_BASE_SIZE + user_len;
            let username = decode_win1252(&data[CONNECT_INFO_BASE_SIZE..user_end]);
            let password = decode_win1252(&data[user_end..user_end + pwd_len]);
            Some(Credentials { username, password })
        } else {
            None
        };

        Ok((
            Self {
                flags,
                error,
                net_id,
                hostname,
                credentials,
            },
            length,
        ))
    }
}

fn encode_win1252(s: &str, field: &str) -> AdsResult<Vec<u8>> {
    let (bytes, _, unmappable) = WINDOWS_1252.encode(s);
    if unmappable {
        return Err(AdsError::InvalidData(format!(
            "{} contains characters outside Windows-1252",
            field
        )));
    }
    Ok(bytes.into_owned())
}

fn decode_win1252(bytes: &[u8]) -> String {
    WINDOWS_1252.decode(bytes).0.into_owned()
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_self_signed_route_add_request() {
        let flags = TlsConnectFlags::ADD_REMOTE
            | TlsConnectFlags::SELF_SIGNED
            | TlsConnectFlags::IP_ADDR
            | TlsConnectFlags::IGNORE_CN;
        let info = TlsConnectInfo::request(
            flags,
            "10.20.30.40.1.1".parse().unwrap(),
            "PC-01",
            Some(Credentials::new("Administrator", "1")),
        );

        let buf = info.encode().unwrap();
        assert_eq!(buf.len(), 78);
        assert_eq!(&buf[0..2], &[0x4E, 0x00]);
        assert_eq!(&buf[2..4], &[0xF0, 0x00]);
        assert_eq!(buf[4], 0x01);
        assert_eq!(buf[5], 0x00);
        assert_eq!(&buf[6..12], &[0x0A, 0x14, 0x1E, 0x28, 0x01, 0x01]);
        assert_eq!(buf[12], 13);
        assert_eq!(buf[13], 1);
        assert!(buf[14..32].iter().all(|&b| b == 0));
        assert_eq!(&buf[32..37], b"PC-01");
        assert!(buf[37..64].iter().all(|&b| b == 0));
        assert_eq!(&buf[64..77], b"Administrator");
        assert_eq!(buf[77], b'1');
    }

    #[test]
    fn test_decode_success_response() {
        let mut data = vec![0u8; 64];
        data[0..2].copy_from_slice(&[0x40, 0x00]);
        data[2..4].copy_from_slice(&[0x03, 0x00]); // Response | AmsAllowed
        data[4] = 0x01;
        data[5] = 0x00;
        data[6..12].copy_from_slice(&[0xC0, 0xA8, 0x01, 0x64, 0x01, 0x01]);
        data[32..38].copy_from_slice(b"PLC-01");

        let (info, consumed) = TlsConnectInfo::decode(&data).unwrap();
        assert_eq!(consumed, 64);
        assert!(info.flags.contains(TlsConnectFlags::RESPONSE));
        assert!(info.flags.contains(TlsConnectFlags::AMS_ALLOWED));
        assert_eq!(info.error, TlsConnectError::NoError);
        assert_eq!(info.net_id, "192.168.1.100.1.1".parse().unwrap());
        assert_eq!(info.hostname, "PLC-01");
        assert_eq!(info.credentials, None);
    }

    #[test]
    fn test_decode_rejects_length_out_of_range() {
        let mut data = vec![0u8; 64];
        data[0..2].copy_from_slice(&[0x02, 0x00]);

        let err = TlsConnectInfo::decode(&data).unwrap_err();
        assert!(err.to_string().contains("length out of range"));
    }

    #[test]
    fn test_decode_rejects_short_input() {
        assert!(TlsConnectInfo::decode(&[0u8; 63]).is_err());
    }

    #[test]
    fn test_decode_rejects_inconsistent_credential_lengths() {
        let mut data = vec![0u8; 70];
        data[0..2].copy_from_slice(&[70, 0]);
        data[4] = 1;
        data[12] = 6; // user_len without pwd_len

        assert!(TlsConnectInfo::decode(&data).is_err());
    }

    #[test]
    fn test_round_trip_with_credentials() {
        let info = TlsConnectInfo::request(
            TlsConnectFlags::ADD_REMOTE | TlsConnectFlags::SELF_SIGNED,
            "192.168.1.50.1.1".parse().unwrap(),
            "engineering-station",
            Some(Credentials::new("user", "pässword")),
        );

        let encoded = info.encode().unwrap();
        let (decoded, consumed) = TlsConnectInfo::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_round_trip_without_credentials() {
        let info = TlsConnectInfo::request(
            TlsConnectFlags::empty(),
            "1.2.3.4.1.1".parse().unwrap(),
            "host-with-a-name-longer-than-thirty-two-bytes",
            None,
        );

        let encoded = info.encode().unwrap();
        assert_eq!(encoded.len(), CONNECT_INFO_BASE_SIZE);

        let (decoded, _) = TlsConnectInfo::decode(&encoded).unwrap();
        // hostname is truncated to the 32-byte field
        assert_eq!(decoded.hostname, "host-with-a-name-longer-than-thi");
        assert_eq!(decoded.credentials, None);
    }

    #[test]
    fn test_encode_rejects_empty_credential_field() {
        let info = TlsConnectInfo::request(
            TlsConnectFlags::empty(),
            "1.2.3.4.1.1".parse().unwrap(),
            "host",
            Some(Credentials::new("user", "")),
        );
        assert!(info.encode().is_err());
    }
}
