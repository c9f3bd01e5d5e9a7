//! AMS frame type

use ads_core::{AdsCommand, AmsAddress, AmsHeader};
use bytes::Bytes;

/// A complete AMS message: header plus owned payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmsFrame {
    pub header: AmsHeader,
    pub payload: Bytes,
}

impl AmsFrame {
    /// Create a frame from a header and payload
    ///
    /// The header's length field is set from the payload.
    pub fn new(mut header: AmsHeader, payload: Bytes) -> Self {
        header.length = payload.len() as u32;
        Self { header, payload }
    }

    /// Build a request frame
    pub fn request(
        target: AmsAddress,
        source: AmsAddress,
        command: AdsCommand,
        invoke_id: u32,
        payload: Bytes,
    ) -> Self {
        let header = AmsHeader::request(target, source, command, payload.len() as u32, invoke_id);
        Self { header, payload }
    }

    /// Invoke id of this frame
    pub fn invoke_id(&self) -> u32 {
        self.header.invoke_id
    }

    /// Command id of this frame
    pub fn command(&self) -> AdsCommand {
        self.header.command
    }
}
