//! Security module for Secure ADS
//!
//! This crate provides the three Secure ADS authentication modes:
//!
//! - **Self-Signed Certificate**: mutual TLS with an unverified (pinned
//!   on the peer at route registration) client certificate
//! - **Shared CA**: mutual TLS with both certificates issued by a common
//!   authority
//! - **Pre-Shared Key**: a dedicated TLS 1.2 PSK driver, required because
//!   the TwinCAT peer only accepts pure-PSK cipher suites and rejects
//!   ClientHellos carrying extensions
//!
//! Certificate modes build on rustls; the PSK mode is implemented by the
//! sans-IO engine in [`psk`].

pub mod config;
pub mod derive;
pub mod error;
pub mod psk;
pub mod tls;

pub use config::SecureAdsConfig;
pub use derive::PskCredentials;
pub use error::{AdsError, AdsResult};
pub use psk::{EngineState, PskEngine, PskTransport, DEFAULT_HANDSHAKE_TIMEOUT};
pub use tls::TlsIdentity;
