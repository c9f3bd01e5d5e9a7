//! TCP transport for standard ADS

use crate::error::{AdsError, AdsResult};
use crate::stream::{with_timeout, StreamAccessor, TransportLayer};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// TCP endpoint settings
///
/// The host is kept as a string and resolved when the transport opens,
/// so device names from configuration work as well as IP literals.
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
    /// Disable Nagle's algorithm on the socket (default on)
    pub nodelay: bool,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Some(Duration::from_secs(30)),
            nodelay: true,
        }
    }

    /// Create TCP settings with timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new(host, port)
        }
    }
}

/// TCP transport layer implementation
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("settings", &self.settings)
            .field("closed", &self.closed)
            .finish()
    }
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Resolve and connect the socket described by `settings`
    pub(crate) async fn connect_stream(settings: &TcpSettings) -> AdsResult<TcpStream> {
        let endpoint = (settings.host.as_str(), settings.port);
        let stream = with_timeout(settings.timeout, TcpStream::connect(endpoint)).await?;
        if settings.nodelay {
            stream.set_nodelay(true).map_err(AdsError::Connection)?;
        }
        debug!(host = %settings.host, port = settings.port, "TCP connection established");
        Ok(stream)
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> AdsResult<()> {
        if !self.closed {
            return Err(AdsError::InvalidData(
                "TCP transport is already open".to_string(),
            ));
        }

        self.stream = Some(Self::connect_stream(&self.settings).await?);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> AdsResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> AdsResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream.as_mut().ok_or(AdsError::NotConnected)?;

        match with_timeout(timeout, stream.read(buf)).await {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> AdsResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream.as_mut().ok_or(AdsError::NotConnected)?;
        with_timeout(timeout, stream.write(buf)).await
    }

    async fn flush(&mut self) -> AdsResult<()> {
        let stream = self.stream.as_mut().ok_or(AdsError::NotConnected)?;
        stream.flush().await.map_err(AdsError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> AdsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
