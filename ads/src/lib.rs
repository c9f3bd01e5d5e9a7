//! Rust implementation of the Beckhoff ADS / Secure ADS protocol
//!
//! This library speaks standard ADS over plain TCP (port 48898) and
//! Secure ADS, the TLS 1.2 tunnelled variant on port 8016, in its three
//! authentication modes: Self-Signed Certificate, Shared CA and
//! Pre-Shared Key.
//!
//! # Architecture
//!
//! The implementation is organized as a workspace with multiple crates:
//!
//! - `ads-core`: primitives (net ids, commands, error codes, states),
//!   error handling and the 32-byte AMS header codec
//! - `ads-transport`: transport layer (TCP, TLS)
//! - `ads-session`: AMS frame codec and the `TlsConnectInfo` handshake
//! - `ads-security`: authentication modes and the TLS-PSK engine
//! - `ads-client`: client implementation
//!
//! # Usage
//!
//! ```no_run
//! use ads::client::{AdsClient, AdsClientConfig};
//! use ads::security::{PskCredentials, SecureAdsConfig};
//! use ads::AmsAddress;
//!
//! # async fn run() -> ads::AdsResult<()> {
//! let secure = SecureAdsConfig::psk(PskCredentials::derive("my-client", "secret")?)
//!     .with_hostname("engineering-station");
//!
//! let config = AdsClientConfig::secure(
//!     "192.168.1.100",
//!     AmsAddress::new("192.168.1.100.1.1".parse()?, 851),
//!     AmsAddress::new("192.168.1.50.1.1".parse()?, 32905),
//!     secure,
//! );
//!
//! let client = AdsClient::new(config);
//! client.connect().await?;
//! let info = client.read_device_info().await?;
//! println!("{} v{}.{}.{}", info.device_name, info.major, info.minor, info.build);
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use ads_core::{
    AdsCommand, AdsError, AdsErrorCode, AdsResult, AdsState, AmsAddress, AmsHeader,
    AmsHeaderFlags, AmsNetId, AmsPort, SecureHandshakeError,
};

// Re-export client API
pub mod client {
    pub use ads_client::*;
}

// Re-export session layer
pub mod session {
    pub use ads_session::*;
}

// Re-export security layer
pub mod security {
    pub use ads_security::*;
}

// Re-export transport layer
pub mod transport {
    pub use ads_transport::*;
}
