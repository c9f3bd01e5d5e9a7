//! AMS header codec
//!
//! Every AMS message starts with a fixed 32-byte little-endian header
//! carrying routing, command id, flags, payload length, error code and
//! the invoke id used for request/response correlation.

use crate::command::AdsCommand;
use crate::error::{AdsError, AdsResult};
use crate::error_code::AdsErrorCode;
use crate::net_id::{AmsAddress, AmsNetId};
use bytes::{BufMut, BytesMut};

/// Size of the fixed AMS header in bytes
pub const AMS_HEADER_SIZE: usize = 32;

/// State flag word of the AMS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmsHeaderFlags(u16);

impl AmsHeaderFlags {
    /// Message is a response
    pub const RESPONSE: u16 = 0x0001;
    /// Message carries an ADS command
    pub const ADS_COMMAND: u16 = 0x0004;

    /// Flag word of an ADS request
    pub fn request() -> Self {
        Self(Self::ADS_COMMAND)
    }

    /// Flag word of an ADS response
    pub fn response() -> Self {
        Self(Self::ADS_COMMAND | Self::RESPONSE)
    }

    /// Create from the raw wire value
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Get the raw wire value
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Check the response bit
    pub fn is_response(&self) -> bool {
        self.0 & Self::RESPONSE != 0
    }

    /// Check the ADS command bit
    pub fn is_ads_command(&self) -> bool {
        self.0 & Self::ADS_COMMAND != 0
    }
}

/// 32-byte AMS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmsHeader {
    pub target: AmsAddress,
    pub source: AmsAddress,
    pub command: AdsCommand,
    pub flags: AmsHeaderFlags,
    /// Length of the payload following the header
    pub length: u32,
    pub error_code: AdsErrorCode,
    pub invoke_id: u32,
}

impl AmsHeader {
    /// Build a request header
    pub fn request(
        target: AmsAddress,
        source: AmsAddress,
        command: AdsCommand,
        length: u32,
        invoke_id: u32,
    ) -> Self {
        Self {
            target,
            source,
            command,
            flags: AmsHeaderFlags::request(),
            length,
            error_code: AdsErrorCode::NO_ERROR,
            invoke_id,
        }
    }

    /// Encode the header into a buffer (little-endian)
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(AMS_HEADER_SIZE);
        dst.put_slice(self.target.net_id.as_bytes());
        dst.put_u16_le(self.target.port);
        dst.put_slice(self.source.net_id.as_bytes());
        dst.put_u16_le(self.source.port);
        dst.put_u16_le(self.command.id());
        dst.put_u16_le(self.flags.bits());
        dst.put_u32_le(self.length);
        dst.put_u32_le(self.error_code.code());
        dst.put_u32_le(self.invoke_id);
    }

    /// Decode a header from bytes
    ///
    /// # Errors
    /// Returns a protocol error if fewer than 32 bytes are supplied or if
    /// the command id is unknown
    pub fn decode(data: &[u8]) -> AdsResult<Self> {
        if data.len() < AMS_HEADER_SIZE {
            return Err(AdsError::Protocol(format!(
                "AMS header too short: expected {}, got {}",
                AMS_HEADER_SIZE,
                data.len()
            )));
        }

        let target_net_id = AmsNetId::from_slice(&data[0..6])?;
        let target_port = u16::from_le_bytes([data[6], data[7]]);
        let source_net_id = AmsNetId::from_slice(&data[8..14])?;
        let source_port = u16::from_le_bytes([data[14], data[15]]);
        let command = AdsCommand::from_id(u16::from_le_bytes([data[16], data[17]]))?;
        let flags = AmsHeaderFlags::from_bits(u16::from_le_bytes([data[18], data[19]]));
        let length = u32::from_le_bytes([data[20], data[21], data[22], data[23]]);
        let error_code =
            AdsErrorCode::new(u32::from_le_bytes([data[24], data[25], data[26], data[27]]));
        let invoke_id = u32::from_le_bytes([data[28], data[29], data[30], data[31]]);

        Ok(Self {
            target: AmsAddress::new(target_net_id, target_port),
            source: AmsAddress::new(source_net_id, source_port),
            command,
            flags,
            length,
            error_code,
            invoke_id,
        })
    }
}
