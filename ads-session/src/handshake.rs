//! Secure ADS connect handshake
//!
//! After the TLS (or TLS-PSK) transport is established, the client sends
//! one `TlsConnectInfo` request and waits for the peer's response before
//! any AMS frame crosses the wire. The exchange owns the stream only for
//! the duration of `connect_exchange`; bytes the peer sends after its
//! response already belong to the AMS frame codec and are returned to
//! the caller untouched.

use crate::connect_info::{
    TlsConnectError, TlsConnectInfo, CONNECT_INFO_BASE_SIZE, CONNECT_INFO_MAX_SIZE,
};
use crate::error::{AdsError, AdsResult};
use ads_transport::StreamAccessor;
use bytes::BytesMut;
use tracing::{debug, trace};

/// Perform the TlsConnectInfo exchange on an established secure stream
///
/// # Returns
/// The decoded response and any bytes that followed it on the wire
///
/// # Errors
/// Fails if the peer closes the stream before answering, if the response
/// is malformed, or if the response carries a non-zero error code (the
/// error name is included in the message)
pub async fn connect_exchange<S>(
    stream: &mut S,
    request: &TlsConnectInfo,
) -> AdsResult<(TlsConnectInfo, BytesMut)>
where
    S: StreamAccessor + ?Sized,
{
    let encoded = request.encode()?;
    stream.write_all(&encoded).await?;
    stream.flush().await?;
    trace!(len = encoded.len(), "sent TlsConnectInfo request");

    let mut buf = BytesMut::with_capacity(CONNECT_INFO_MAX_SIZE);
    let mut chunk = [0u8; 512];
    loop {
        if buf.len() >= 2 {
            let length = u16::from_le_bytes([buf[0], buf[1]]) as usize;
            if !(CONNECT_INFO_BASE_SIZE..=CONNECT_INFO_MAX_SIZE).contains(&length) {
                return Err(AdsError::Protocol(format!(
                    "TlsConnectInfo length out of range: {}",
                    length
                )));
            }
            if buf.len() >= length {
                break;
            }
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(AdsError::ChannelInactive);
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let (response, consumed) = TlsConnectInfo::decode(&buf)?;
    let _ = buf.split_to(consumed);

    if response.error != TlsConnectError::NoError {
        return Err(AdsError::Protocol(format!(
            "Secure ADS handshake rejected: {}",
            response.error.name()
        )));
    }

    debug!(peer = %response.net_id, hostname = %response.hostname, "Secure ADS handshake complete");
    Ok((response, buf))
}
