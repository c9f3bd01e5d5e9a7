//! Byte stream abstraction for the transport layer

use crate::error::{AdsError, AdsResult};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Asynchronous byte stream to an ADS device
///
/// Implemented by the plain TCP transport and by both secure tunnels
/// (rustls for the certificate modes, the PSK engine for PSK mode), so
/// the layers above never know which variant carries their bytes. Reads
/// return whatever the stream has available; framing is the session
/// layer's job.
#[async_trait]
pub trait StreamAccessor: Send {
    /// Set the per-operation timeout
    ///
    /// `None` disables the timeout. The connection-level request timeout
    /// is enforced above this layer; a connected session usually runs
    /// with the stream timeout disabled.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> AdsResult<()>;

    /// Read available bytes into `buf`
    ///
    /// # Returns
    /// Number of bytes read; 0 signals EOF
    async fn read(&mut self, buf: &mut [u8]) -> AdsResult<usize>;

    /// Write bytes from `buf`
    ///
    /// # Returns
    /// Number of bytes accepted by the stream
    async fn write(&mut self, buf: &[u8]) -> AdsResult<usize>;

    /// Write the whole buffer
    async fn write_all(&mut self, mut buf: &[u8]) -> AdsResult<()> {
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            if n == 0 {
                return Err(AdsError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "stream accepted no bytes",
                )));
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> AdsResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> AdsResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the connection
    async fn open(&mut self) -> AdsResult<()>;
}

/// Run one I/O operation under an optional deadline
///
/// Shared by the concrete transports so timeout mapping lives in one
/// place.
pub(crate) async fn with_timeout<T>(
    timeout: Option<Duration>,
    operation: impl Future<Output = std::io::Result<T>> + Send,
) -> AdsResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| AdsError::Timeout)?
            .map_err(AdsError::Connection),
        None => operation.await.map_err(AdsError::Connection),
    }
}
