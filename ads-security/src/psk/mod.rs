//! TLS-PSK engine and transport
//!
//! TwinCAT's embedded TLS stack rejects ClientHellos bearing extensions
//! such as `extended_master_secret` or `encrypt_then_mac` that mainstream
//! TLS libraries add by default, and negotiates only pure-PSK cipher
//! suites. Neither constraint can be met with rustls, so this module
//! carries a dedicated non-blocking TLS 1.2 client:
//!
//! - [`suites`]: the four offered PSK cipher suites
//! - [`prf`]: TLS 1.2 PRF, premaster/master secret and key expansion
//! - [`record`]: CBC/HMAC record protection with explicit IVs
//! - [`handshake`]: handshake message codecs
//! - [`engine`]: the sans-IO state machine
//! - [`transport`]: the tokio [`TransportLayer`](ads_transport::TransportLayer) driver

pub mod engine;
pub mod handshake;
pub mod prf;
pub mod record;
pub mod suites;
pub mod transport;

pub use engine::{EngineState, PskEngine, MAX_PENDING_WRITE_BYTES};
pub use suites::{PskCipherSuite, OFFERED_SUITES};
pub use transport::{PskTransport, DEFAULT_HANDSHAKE_TIMEOUT};
