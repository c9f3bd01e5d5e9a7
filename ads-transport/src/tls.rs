//! TLS transport for the certificate-based Secure ADS modes

use crate::error::{AdsError, AdsResult};
use crate::stream::{with_timeout, StreamAccessor, TransportLayer};
use crate::tcp::{TcpSettings, TcpTransport};
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// TLS transport layer for Secure ADS
///
/// Wraps a TCP connection in a TLS 1.2 session as negotiated by the
/// supplied client configuration. The TwinCAT peer authenticates the
/// client through its certificate; hostname verification is the
/// responsibility of the configuration (disabled for Secure ADS, where
/// device certificate names rarely match the endpoint).
pub struct TlsTransport {
    stream: Option<TlsStream<TcpStream>>,
    settings: TcpSettings,
    connector: TlsConnector,
    server_name: ServerName<'static>,
    closed: bool,
}

impl fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsTransport")
            .field("settings", &self.settings)
            .field("closed", &self.closed)
            .finish()
    }
}

impl TlsTransport {
    /// Create a new TLS transport layer
    ///
    /// # Errors
    /// Returns a configuration error if the host cannot be used as a TLS
    /// server name
    pub fn new(settings: TcpSettings, config: Arc<rustls::ClientConfig>) -> AdsResult<Self> {
        let server_name = ServerName::try_from(settings.host.clone())
            .map_err(|e| AdsError::Config(format!("Invalid TLS server name: {}", e)))?;
        Ok(Self {
            stream: None,
            settings,
            connector: TlsConnector::from(config),
            server_name,
            closed: true,
        })
    }
}

#[async_trait]
impl TransportLayer for TlsTransport {
    async fn open(&mut self) -> AdsResult<()> {
        if !self.closed {
            return Err(AdsError::InvalidData(
                "TLS transport is already open".to_string(),
            ));
        }

        let tcp = TcpTransport::connect_stream(&self.settings).await?;

        let handshake = self.connector.connect(self.server_name.clone(), tcp);
        let stream = match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| AdsError::Timeout)?
                .map_err(|e| AdsError::Tls(e.to_string()))?,
            None => handshake.await.map_err(|e| AdsError::Tls(e.to_string()))?,
        };

        debug!(host = %self.settings.host, port = self.settings.port, "TLS session established");
        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TlsTransport {
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
