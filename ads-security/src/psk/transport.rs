//! Tokio transport driving the PSK engine

use crate::derive::PskCredentials;
use crate::error::{AdsError, AdsResult, SecureHandshakeError};
use crate::psk::engine::PskEngine;
use async_trait::async_trait;
use ads_transport::{StreamAccessor, TransportLayer};
use std::time::Duration;
use tracing::debug;

/// Default bound on the TLS-PSK handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport layer that tunnels an inner transport through the PSK engine
///
/// `open` connects the inner transport and drives the TLS handshake to
/// completion under [`DEFAULT_HANDSHAKE_TIMEOUT`] (configurable); reads
/// and writes afterwards move decrypted application data.
#[derive(Debug)]
pub struct PskTransport<T: TransportLayer> {
    inner: T,
    engine: PskEngine,
    handshake_timeout: Duration,
}

impl<T: TransportLayer> PskTransport<T> {
    /// Create a PSK transport over an inner transport
    pub fn new(inner: T, credentials: &PskCredentials) -> Self {
        Self {
            inner,
            engine: PskEngine::new(credentials.identity().as_bytes().to_vec(), *credentials.key()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Override the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn flush_engine(&mut self) -> AdsResult<()> {
        while let Some(out) = self.engine.take_tls_output() {
            self.inner.write_all(&out).await?;
        }
        self.inner.flush().await
    }

    async fn drive_handshake(&mut self) -> AdsResult<()> {
        self.engine.start()?;
        self.flush_engine().await?;

        let mut chunk = [0u8; 4096];
        while !self.engine.is_established() {
            let n = match self.inner.read(&mut chunk).await {
                Ok(n) => n,
                Err(AdsError::Timeout) => return Err(AdsError::Timeout),
                Err(e) => {
                    return Err(AdsError::Handshake(SecureHandshakeError::TransportError(
                        e.to_string(),
                    )))
                }
            };
            if n == 0 {
                let cause = self
                    .engine
                    .transport_closed()
                    .unwrap_or_else(|| {
                        SecureHandshakeError::ConnectionClosed("closed during handshake".to_string())
                    });
                return Err(AdsError::Handshake(cause));
            }

            let result = self.engine.read_tls(&chunk[..n]);
            self.flush_engine().await?;
            result?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: TransportLayer> TransportLayer for PskTransport<T> {
    async fn open(&mut self) -> AdsResult<()> {
        self.inner.open().await?;

        let result = tokio::time::timeout(self.handshake_timeout, self.drive_handshake()).await;
        match result {
            Ok(Ok(())) => {
                debug!("PSK transport established");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = self.inner.close().await;
                Err(e)
            }
            Err(_) => {
                let _ = self.inner.close().await;
                Err(AdsError::Handshake(SecureHandshakeError::HandshakeTimeout))
            }
        }
    }
}

#[async_trait]
impl<T: TransportLayer> StreamAccessor for PskTransport<T> {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> AdsResult<()> {
        self.inner.set_timeout(timeout).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> AdsResult<usize> {
        loop {
            let n = self.engine.read_plaintext(buf);
            if n > 0 {
                return Ok(n);
            }
            if self.engine.is_closed() {
                return Ok(0);
            }

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                self.engine.transport_closed();
                continue;
            }
            self.engine.read_tls(&chunk[..n])?;
        }
    }

    async fn write(&mut self, buf: &[u8]) -> AdsResult<usize> {
        self.engine.write_plaintext(buf)?;
        self.flush_engine().await?;
        Ok(buf.len())
    }

    async fn flush(&mut self) -> AdsResult<()> {
        self.flush_engine().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed() || self.engine.is_closed()
    }

    async fn close(&mut self) -> AdsResult<()> {
        self.engine.send_close_notify();
        let _ = self.flush_engine().await;
        self.inner.close().await
    }
}
