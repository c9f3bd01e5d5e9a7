use crate::error_code::AdsErrorCode;
use thiserror::Error;

/// Main error type for ADS operations
#[derive(Error, Debug)]
pub enum AdsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Secure handshake failed: {0}")]
    Handshake(#[from] SecureHandshakeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Frame length {length} exceeds maximum of {max} bytes")]
    FrameTooLong { length: usize, max: usize },

    #[error("ADS device error: {0}")]
    Device(AdsErrorCode),

    #[error("Timeout")]
    Timeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Client is disconnecting")]
    Disconnecting,

    #[error("Channel inactive")]
    ChannelInactive,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for ADS operations
pub type AdsResult<T> = Result<T, AdsError>;

/// Failure taxonomy of the secure transport handshake.
///
/// Covers both the TLS-PSK engine and the certificate-based TLS
/// connectors. Messages never carry key material or credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecureHandshakeError {
    /// Peer answered the ClientHello with a handshake_failure alert
    #[error("no compatible cipher suite")]
    NoCompatibleSuite,

    /// Peer rejected the Finished exchange or sent a decrypt_error alert
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Malformed or unexpected handshake data
    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    /// Peer closed the connection before the handshake completed
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("handshake timeout")]
    HandshakeTimeout,

    #[error("unknown handshake failure (alert {0})")]
    Unknown(u8),
}
