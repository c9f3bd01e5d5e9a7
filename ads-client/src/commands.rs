//! Payload codecs of the demonstrated ADS commands

use crate::error::{AdsError, AdsResult};
use ads_core::{AdsErrorCode, AdsState};

/// Response of ReadDeviceInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
    pub device_name: String,
}

impl DeviceInfo {
    /// Decode a ReadDeviceInfo response payload
    ///
    /// Layout: u32 LE result, u8 major, u8 minor, u16 LE build, 16-byte
    /// null-padded device name. A non-zero result is surfaced as a
    /// device error before any field is decoded.
    pub fn decode(payload: &[u8]) -> AdsResult<Self> {
        if payload.len() < 24 {
            return Err(AdsError::Protocol(format!(
                "ReadDeviceInfo response too short: {}",
                payload.len()
            )));
        }

        let result = AdsErrorCode::new(u32::from_le_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]));
        if result.is_error() {
            return Err(AdsError::Device(result));
        }

        let name_bytes = &payload[8..24];
        let name_end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_bytes.len());
        let device_name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        Ok(Self {
            major: payload[4],
            minor: payload[5],
            build: u16::from_le_bytes([payload[6], payload[7]]),
            device_name,
        })
    }
}

/// Response of ReadState
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    pub ads_state: AdsState,
    pub device_state: u16,
}

impl StateInfo {
    /// Decode a ReadState response payload
    ///
    /// Layout: u32 LE result, u16 LE ADS state, u16 LE device state.
    pub fn decode(payload: &[u8]) -> AdsResult<Self> {
        if payload.len() < 8 {
            return Err(AdsError::Protocol(format!(
                "ReadState response too short: {}",
                payload.len()
            )));
        }

        let result = AdsErrorCode::new(u32::from_le_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]));
        if result.is_error() {
            return Err(AdsError::Device(result));
        }

        Ok(Self {
            ads_state: AdsState::from_id(u16::from_le_bytes([payload[4], payload[5]]))?,
            device_state: u16::from_le_bytes([payload[6], payload[7]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_device_info() {
        let mut payload = vec![0u8; 24];
        payload[4] = 3;
        payload[5] = 1;
        payload[6..8].copy_from_slice(&4024u16.to_le_bytes());
        payload[8..19].copy_from_slice(b"TwinCAT PLC");

        let info = DeviceInfo::decode(&payload).unwrap();
        assert_eq!(info.major, 3);
        assert_eq!(info.minor, 1);
        assert_eq!(info.build, 4024);
        assert_eq!(info.device_name, "TwinCAT PLC");
    }

    #[test]
    fn test_decode_device_info_error_result() {
        let mut payload = vec![0u8; 24];
        payload[0..4].copy_from_slice(&0x0701u32.to_le_bytes());

        let err = DeviceInfo::decode(&payload).unwrap_err();
        assert!(matches!(err, AdsError::Device(code) if code.code() == 0x0701));
    }

    #[test]
    fn test_decode_state() {
        let mut payload = vec![0u8; 8];
        payload[4..6].copy_from_slice(&5u16.to_le_bytes());
        payload[6..8].copy_from_slice(&2u16.to_le_bytes());

        let state = StateInfo::decode(&payload).unwrap();
        assert_eq!(state.ads_state, AdsState::Run);
        assert_eq!(state.device_state, 2);
    }

    #[test]
    fn test_decode_state_too_short() {
        assert!(StateInfo::decode(&[0u8; 7]).is_err());
    }
}
