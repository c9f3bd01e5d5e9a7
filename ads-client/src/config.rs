//! Client configuration

use ads_core::AmsAddress;
use ads_security::SecureAdsConfig;
use std::time::Duration;

/// Default port of standard ADS over plain TCP
pub const DEFAULT_ADS_TCP_PORT: u16 = 48898;

/// Default port of Secure ADS
pub const DEFAULT_SECURE_ADS_PORT: u16 = 8016;

/// Default bound on connection establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single request/response exchange
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of an [`AdsClient`](crate::AdsClient)
#[derive(Debug, Clone)]
pub struct AdsClientConfig {
    /// Hostname or IP address of the device
    pub host: String,
    pub port: u16,
    /// Routing destination (device net id and AMS port)
    pub target: AmsAddress,
    /// Routing source (this client's net id and AMS port)
    pub source: AmsAddress,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Secure ADS authentication; `None` selects plain TCP
    pub secure: Option<SecureAdsConfig>,
}

impl AdsClientConfig {
    /// Configuration for standard ADS over plain TCP
    pub fn new(host: impl Into<String>, target: AmsAddress, source: AmsAddress) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_ADS_TCP_PORT,
            target,
            source,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            secure: None,
        }
    }

    /// Configuration for Secure ADS
    pub fn secure(
        host: impl Into<String>,
        target: AmsAddress,
        source: AmsAddress,
        secure: SecureAdsConfig,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SECURE_ADS_PORT,
            target,
            source,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            secure: Some(secure),
        }
    }

    /// Override the TCP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
