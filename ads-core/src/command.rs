//! ADS command identifiers

use crate::error::{AdsError, AdsResult};

/// ADS command id carried in the AMS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsCommand {
    /// Invalid command
    Invalid = 0,
    /// Read name and version of the ADS device
    ReadDeviceInfo = 1,
    /// Read data from an ADS device
    Read = 2,
    /// Write data to an ADS device
    Write = 3,
    /// Read ADS and device state
    ReadState = 4,
    /// Change ADS and device state
    WriteControl = 5,
    /// Register a device notification
    AddDeviceNotification = 6,
    /// Unregister a device notification
    DeleteDeviceNotification = 7,
    /// Spontaneous notification pushed by the device
    DeviceNotification = 8,
    /// Combined write-then-read
    ReadWrite = 9,
}

impl AdsCommand {
    /// Get the wire id
    pub fn id(&self) -> u16 {
        *self as u16
    }

    /// Get the command from its wire id
    pub fn from_id(id: u16) -> AdsResult<Self> {
        match id {
            0 => Ok(AdsCommand::Invalid),
            1 => Ok(AdsCommand::ReadDeviceInfo),
            2 => Ok(AdsCommand::Read),
            3 => Ok(AdsCommand::Write),
            4 => Ok(AdsCommand::ReadState),
            5 => Ok(AdsCommand::WriteControl),
            6 => Ok(AdsCommand::AddDeviceNotification),
            7 => Ok(AdsCommand::DeleteDeviceNotification),
            8 => Ok(AdsCommand::DeviceNotification),
            9 => Ok(AdsCommand::ReadWrite),
            _ => Err(AdsError::Protocol(format!(
                "Unknown AMS command id: 0x{:04X}",
                id
            ))),
        }
    }
}
