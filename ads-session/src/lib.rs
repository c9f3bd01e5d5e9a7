//! Session layer module for the ADS protocol
//!
//! This crate provides the AMS frame codec with its two wire framings
//! (standard ADS with the 6-byte AMS/TCP preamble, Secure ADS without),
//! the `TlsConnectInfo` application-layer handshake codec, and the
//! one-shot connect exchange performed after a secure transport is
//! established.

pub mod codec;
pub mod connect_info;
pub mod error;
pub mod frame;
pub mod handshake;

pub use codec::{AmsFrameCodec, MAX_FRAME_LENGTH, TCP_HEADER_SIZE};
pub use connect_info::{
    Credentials, TlsConnectError, TlsConnectFlags, TlsConnectInfo, CONNECT_INFO_BASE_SIZE,
    CONNECT_INFO_MAX_SIZE, HOSTNAME_FIELD_LEN,
};
pub use error::{AdsError, AdsResult};
pub use frame::AmsFrame;
pub use handshake::connect_exchange;
