//! Transport layer module for the ADS protocol
//!
//! This crate provides the byte-stream abstraction the upper layers are
//! built on, together with the plain TCP transport used by standard ADS
//! (port 48898) and the TLS transport used by the certificate-based
//! Secure ADS modes (port 8016).

pub mod error;
pub mod stream;
pub mod tcp;
pub mod tls;

pub use error::{AdsError, AdsResult};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
pub use tls::TlsTransport;
