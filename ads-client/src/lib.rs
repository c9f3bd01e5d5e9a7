//! Client implementation for ADS and Secure ADS
//!
//! The client owns one connection to an ADS device, assembled from the
//! configured authentication mode:
//!
//! - plain TCP (port 48898) with the AMS/TCP framing
//! - certificate-based TLS (Secure ADS, port 8016) with raw framing
//! - TLS-PSK (Secure ADS) with raw framing
//!
//! Requests are correlated with responses by invoke id, so any number of
//! commands may be in flight concurrently on one connection. All socket
//! and codec state lives on a process-wide single-threaded I/O worker;
//! callers interact through completion channels.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod runtime;

pub use client::AdsClient;
pub use commands::{DeviceInfo, StateInfo};
pub use config::{
    AdsClientConfig, DEFAULT_ADS_TCP_PORT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SECURE_ADS_PORT,
};
pub use error::{AdsError, AdsResult};
pub use runtime::release_shared_resources;
