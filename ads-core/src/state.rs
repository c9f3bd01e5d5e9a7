//! ADS device state machine values

use crate::error::{AdsError, AdsResult};

/// State of an ADS device as reported by ReadState
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsState {
    Invalid = 0,
    Idle = 1,
    Reset = 2,
    Init = 3,
    Start = 4,
    Run = 5,
    Stop = 6,
    SaveConfig = 7,
    LoadConfig = 8,
    PowerFailure = 9,
    PowerGood = 10,
    Error = 11,
    Shutdown = 12,
    Suspend = 13,
    Resume = 14,
    Config = 15,
    Reconfig = 16,
    Stopping = 17,
    Incompatible = 18,
    Exception = 19,
}

impl AdsState {
    /// Get the wire id
    pub fn id(&self) -> u16 {
        *self as u16
    }

    /// Get the state from its wire id
    pub fn from_id(id: u16) -> AdsResult<Self> {
        match id {
            0 => Ok(AdsState::Invalid),
            1 => Ok(AdsState::Idle),
            2 => Ok(AdsState::Reset),
            3 => Ok(AdsState::Init),
            4 => Ok(AdsState::Start),
            5 => Ok(AdsState::Run),
            6 => Ok(AdsState::Stop),
            7 => Ok(AdsState::SaveConfig),
            8 => Ok(AdsState::LoadConfig),
            9 => Ok(AdsState::PowerFailure),
            10 => Ok(AdsState::PowerGood),
            11 => Ok(AdsState::Error),
            12 => Ok(AdsState::Shutdown),
            13 => Ok(AdsState::Suspend),
            14 => Ok(AdsState::Resume),
            15 => Ok(AdsState::Config),
            16 => Ok(AdsState::Reconfig),
            17 => Ok(AdsState::Stopping),
            18 => Ok(AdsState::Incompatible),
            19 => Ok(AdsState::Exception),
            _ => Err(AdsError::Protocol(format!("Invalid ADS state: {}", id))),
        }
    }

    /// Check whether the device executes its task cycle in this state
    pub fn is_running(&self) -> bool {
        matches!(self, AdsState::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for id in 0..=19u16 {
            let state = AdsState::from_id(id).unwrap();
            assert_eq!(state.id(), id);
        }
    }

    #[test]
    fn test_out_of_range_state() {
        assert!(AdsState::from_id(20).is_err());
    }

    #[test]
    fn test_is_running() {
        assert!(AdsState::Run.is_running());
        assert!(!AdsState::Config.is_running());
    }
}
