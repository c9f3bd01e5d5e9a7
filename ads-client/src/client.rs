//! ADS client session
//!
//! One `AdsClient` owns one connection. The transport, frame codec and
//! read loop live in a task on the shared I/O worker; callers submit
//! frames through a command channel and await a per-request completion
//! slot keyed by invoke id.

use crate::commands::{DeviceInfo, StateInfo};
use crate::config::AdsClientConfig;
use crate::error::{AdsError, AdsResult};
use crate::runtime;
use ads_core::AdsCommand;
use ads_security::{PskTransport, SecureAdsConfig};
use ads_session::{connect_exchange, AmsFrame, AmsFrameCodec};
use ads_transport::{StreamAccessor, TcpSettings, TcpTransport, TlsTransport, TransportLayer};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

type ResponseSlot = oneshot::Sender<AdsResult<AmsFrame>>;

/// Correlation map shared between callers and the I/O task
///
/// Entries are removed exactly once; whichever of response, timeout,
/// write failure or teardown wins the `remove` settles the slot.
#[derive(Default)]
struct PendingMap {
    inner: Mutex<HashMap<u32, ResponseSlot>>,
}

impl PendingMap {
    fn insert(&self, invoke_id: u32, slot: ResponseSlot) {
        self.inner
            .lock()
            .expect("pending map lock poisoned")
            .insert(invoke_id, slot);
    }

    fn remove(&self, invoke_id: u32) -> Option<ResponseSlot> {
        self.inner
            .lock()
            .expect("pending map lock poisoned")
            .remove(&invoke_id)
    }

    fn drain(&self) -> Vec<ResponseSlot> {
        self.inner
            .lock()
            .expect("pending map lock poisoned")
            .drain()
            .map(|(_, slot)| slot)
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("pending map lock poisoned").len()
    }
}

enum IoCommand {
    Send { invoke_id: u32, bytes: Bytes },
    Shutdown,
}

struct Connection {
    writer: mpsc::Sender<IoCommand>,
    pending: Arc<PendingMap>,
    disconnecting: Arc<AtomicBool>,
    io_task: JoinHandle<()>,
}

/// Client for one ADS device connection
///
/// All methods take `&self`; requests may be issued concurrently from
/// any number of tasks and are correlated by invoke id.
pub struct AdsClient {
    config: AdsClientConfig,
    invoke_seq: AtomicU64,
    connection: Mutex<Option<Connection>>,
}

impl AdsClient {
    /// Create a client; no connection is opened yet
    pub fn new(config: AdsClientConfig) -> Self {
        Self {
            config,
            invoke_seq: AtomicU64::new(1),
            connection: Mutex::new(None),
        }
    }

    /// Check whether a connection is currently established
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .expect("connection lock poisoned")
            .is_some()
    }

    /// Open the connection, including the secure handshake when
    /// configured
    ///
    /// Bounded by the configured connect timeout. On failure the client
    /// stays in the not-connected state; `connect` may be retried.
    pub async fn connect(&self) -> AdsResult<()> {
        if self.is_connected() {
            return Err(AdsError::InvalidData(
                "client is already connected".to_string(),
            ));
        }

        let handle = runtime::io_handle()?;
        let config = self.config.clone();
        let connect_timeout = self.config.connect_timeout;

        // the whole pipeline is assembled on the shared I/O worker
        let opened = handle
            .spawn(async move {
                match tokio::time::timeout(connect_timeout, open_connection(&config)).await {
                    Ok(result) => result,
                    Err(_) => Err(AdsError::Timeout),
                }
            })
            .await
            .map_err(|e| AdsError::InvalidData(format!("connect task failed: {}", e)))??;
        let (transport, codec, leftover) = opened;

        let pending = Arc::new(PendingMap::default());
        let (writer, commands) = mpsc::channel(64);
        let io_task = handle.spawn(io_loop(transport, codec, leftover, commands, pending.clone()));

        let connection = Connection {
            writer,
            pending,
            disconnecting: Arc::new(AtomicBool::new(false)),
            io_task,
        };

        let mut guard = self.connection.lock().expect("connection lock poisoned");
        if guard.is_some() {
            connection.io_task.abort();
            return Err(AdsError::InvalidData(
                "client is already connected".to_string(),
            ));
        }
        *guard = Some(connection);
        debug!(host = %self.config.host, port = self.config.port, "connected");
        Ok(())
    }

    /// Close the connection and fail every pending request
    ///
    /// A subsequent `connect` is permitted and starts from a clean
    /// state. Disconnecting an unconnected client is a no-op.
    pub async fn disconnect(&self) -> AdsResult<()> {
        let connection = self
            .connection
            .lock()
            .expect("connection lock poisoned")
            .take();
        let Some(connection) = connection else {
            return Ok(());
        };

        connection.disconnecting.store(true, Ordering::SeqCst);
        for slot in connection.pending.drain() {
            let _ = slot.send(Err(AdsError::Disconnecting));
        }
        let _ = connection.writer.send(IoCommand::Shutdown).await;
        let _ = connection.io_task.await;
        debug!("disconnected");
        Ok(())
    }

    /// Read name and version of the device
    pub async fn read_device_info(&self) -> AdsResult<DeviceInfo> {
        let frame = self
            .request(AdsCommand::ReadDeviceInfo, Bytes::new())
            .await?;
        DeviceInfo::decode(&frame.payload)
    }

    /// Read the ADS and device state
    pub async fn read_state(&self) -> AdsResult<StateInfo> {
        let frame = self.request(AdsCommand::ReadState, Bytes::new()).await?;
        StateInfo::decode(&frame.payload)
    }

    /// Send one command and await its response frame
    ///
    /// A non-zero error code in the response header is returned as a
    /// device error before the payload is looked at.
    pub async fn request(&self, command: AdsCommand, payload: Bytes) -> AdsResult<AmsFrame> {
        let (writer, pending) = {
            let guard = self.connection.lock().expect("connection lock poisoned");
            let connection = guard.as_ref().ok_or(AdsError::NotConnected)?;
            if connection.disconnecting.load(Ordering::SeqCst) {
                return Err(AdsError::Disconnecting);
            }
            (connection.writer.clone(), connection.pending.clone())
        };

        // monotonic 64-bit counter truncated to the 32-bit wire field
        let invoke_id = self.invoke_seq.fetch_add(1, Ordering::Relaxed) as u32;
        let frame = AmsFrame::request(
            self.config.target,
            self.config.source,
            command,
            invoke_id,
            payload,
        );
        let mut encoded = BytesMut::new();
        let mut codec = self.frame_codec();
        codec.encode(frame, &mut encoded)?;
        trace!(command = ?command, invoke_id, "sending request");

        let (slot, response) = oneshot::channel();
        pending.insert(invoke_id, slot);

        if writer
            .send(IoCommand::Send {
                invoke_id,
                bytes: encoded.freeze(),
            })
            .await
            .is_err()
        {
            pending.remove(invoke_id);
            return Err(AdsError::ChannelInactive);
        }

        let frame = match tokio::time::timeout(self.config.request_timeout, response).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(AdsError::ChannelInactive),
            Err(_) => {
                // the timer won the race: withdraw the correlation entry
                pending.remove(invoke_id);
                return Err(AdsError::Timeout);
            }
        };

        if frame.header.error_code.is_error() {
            return Err(AdsError::Device(frame.header.error_code));
        }
        Ok(frame)
    }

    /// Number of requests currently awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.connection
            .lock()
            .expect("connection lock poisoned")
            .as_ref()
            .map(|c| c.pending.len())
            .unwrap_or(0)
    }

    fn frame_codec(&self) -> AmsFrameCodec {
        if self.config.secure.is_some() {
            AmsFrameCodec::raw()
        } else {
            AmsFrameCodec::tcp()
        }
    }
}

/// Assemble the transport pipeline for the configured mode
async fn open_connection(
    config: &AdsClientConfig,
) -> AdsResult<(Box<dyn StreamAccessor + Send>, AmsFrameCodec, BytesMut)> {
    let settings = TcpSettings::with_timeout(
        config.host.clone(),
        config.port,
        config.connect_timeout,
    );

    match &config.secure {
        None => {
            let mut transport = TcpTransport::new(settings);
            transport.open().await?;
            transport.set_timeout(None).await?;
            Ok((Box::new(transport), AmsFrameCodec::tcp(), BytesMut::new()))
        }
        Some(secure @ SecureAdsConfig::Psk { credentials, .. }) => {
            let request = secure.connect_info_request(config.source.net_id);
            let mut transport = PskTransport::new(TcpTransport::new(settings), credentials);
            transport.open().await?;
            let leftover = match connect_exchange(&mut transport, &request).await {
                Ok((_, leftover)) => leftover,
                Err(e) => {
                    let _ = transport.close().await;
                    return Err(e);
                }
            };
            transport.set_timeout(None).await?;
            Ok((Box::new(transport), AmsFrameCodec::raw(), leftover))
        }
        Some(secure) => {
            let request = secure.connect_info_request(config.source.net_id);
            let tls_config = secure.tls_client_config()?.ok_or_else(|| {
                AdsError::Config("certificate mode without TLS configuration".to_string())
            })?;
            let mut transport = TlsTransport::new(settings, tls_config)?;
            transport.open().await?;
            let leftover = match connect_exchange(&mut transport, &request).await {
                Ok((_, leftover)) => leftover,
                Err(e) => {
                    let _ = transport.close().await;
                    return Err(e);
                }
            };
            transport.set_timeout(None).await?;
            Ok((Box::new(transport), AmsFrameCodec::raw(), leftover))
        }
    }
}

/// Connection task: serializes writes, reassembles and dispatches reads
async fn io_loop(
    mut transport: Box<dyn StreamAccessor + Send>,
    mut codec: AmsFrameCodec,
    mut read_buf: BytesMut,
    mut commands: mpsc::Receiver<IoCommand>,
    pending: Arc<PendingMap>,
) {
    // frames the peer sent right behind the handshake response
    if let Err(e) = drain_frames(&mut codec, &mut read_buf, &pending) {
        warn!(%e, "protocol error on handshake leftover");
        let _ = transport.close().await;
        fail_all(&pending);
        return;
    }

    let mut chunk = [0u8; 8192];
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(IoCommand::Send { invoke_id, bytes }) => {
                    let result = async {
                        transport.write_all(&bytes).await?;
                        transport.flush().await
                    }
                    .await;
                    if let Err(e) = result {
                        warn!(invoke_id, %e, "write failed");
                        // the write failure settles the offending slot;
                        // the transport is unusable afterwards
                        if let Some(slot) = pending.remove(invoke_id) {
                            let _ = slot.send(Err(e));
                        }
                        break;
                    }
                }
                Some(IoCommand::Shutdown) | None => break,
            },
            result = transport.read(&mut chunk) => match result {
                Ok(0) => {
                    debug!("transport closed by peer");
                    break;
                }
                Ok(n) => {
                    read_buf.extend_from_slice(&chunk[..n]);
                    if let Err(e) = drain_frames(&mut codec, &mut read_buf, &pending) {
                        warn!(%e, "protocol error, closing connection");
                        break;
                    }
                }
                Err(e) => {
                    warn!(%e, "transport read failed");
                    break;
                }
            },
        }
    }

    let _ = transport.close().await;
    fail_all(&pending);
}

fn drain_frames(
    codec: &mut AmsFrameCodec,
    read_buf: &mut BytesMut,
    pending: &PendingMap,
) -> AdsResult<()> {
    while let Some(frame) = codec.decode(read_buf)? {
        dispatch_frame(frame, pending);
    }
    Ok(())
}

fn dispatch_frame(frame: AmsFrame, pending: &PendingMap) {
    if frame.command() == AdsCommand::DeviceNotification {
        // notifications are consumed and released; no subscription API
        trace!(invoke_id = frame.invoke_id(), "dropping device notification");
        return;
    }

    match pending.remove(frame.invoke_id()) {
        Some(slot) => {
            trace!(invoke_id = frame.invoke_id(), "dispatching response");
            let _ = slot.send(Ok(frame));
        }
        None => {
            debug!(
                invoke_id = frame.invoke_id(),
                "no pending request for response, dropping"
            );
        }
    }
}

fn fail_all(pending: &PendingMap) {
    for slot in pending.drain() {
        let _ = slot.send(Err(AdsError::ChannelInactive));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ads_core::net_id::ports;
    use ads_core::{AdsState, AmsAddress, AmsHeader, AmsHeaderFlags};
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    fn addresses() -> (AmsAddress, AmsAddress) {
        (
            AmsAddress::new("10.20.30.40.1.1".parse().unwrap(), ports::TC3_PLC1),
            AmsAddress::new("192.168.1.50.1.1".parse().unwrap(), 32905),
        )
    }

    fn response_frame(request: &AmsFrame, payload: Vec<u8>) -> AmsFrame {
        let header = AmsHeader {
            target: request.header.source,
            source: request.header.target,
            command: request.header.command,
            flags: AmsHeaderFlags::response(),
            length: payload.len() as u32,
            error_code: request.header.error_code,
            invoke_id: request.header.invoke_id,
        };
        AmsFrame::new(header, Bytes::from(payload))
    }

    fn state_payload(device_state: u16) -> Vec<u8> {
        let mut payload = vec![0u8; 8];
        payload[4..6].copy_from_slice(&AdsState::Run.id().to_le_bytes());
        payload[6..8].copy_from_slice(&device_state.to_le_bytes());
        payload
    }

    fn device_info_payload() -> Vec<u8> {
        let mut payload = vec![0u8; 24];
        payload[4] = 3;
        payload[5] = 1;
        payload[6..8].copy_from_slice(&4024u16.to_le_bytes());
        payload[8..15].copy_from_slice(b"TC3 PLC");
        payload
    }

    /// Plain-TCP mock device answering ReadState and ReadDeviceInfo;
    /// pairs of requests are answered in reversed order to exercise
    /// out-of-order dispatch.
    async fn mock_device(listener: TcpListener, respond: bool) {
        let (socket, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(socket, AmsFrameCodec::tcp());

        let mut backlog: Vec<AmsFrame> = Vec::new();
        while let Some(Ok(request)) = framed.next().await {
            if !respond {
                continue;
            }
            backlog.push(request);
            if backlog.len() < 2 {
                continue;
            }
            for request in backlog.drain(..).rev() {
                let payload = match request.command() {
                    AdsCommand::ReadState => {
                        state_payload(request.invoke_id() as u16)
                    }
                    AdsCommand::ReadDeviceInfo => device_info_payload(),
                    other => panic!("unexpected command {:?}", other),
                };
                framed
                    .send(response_frame(&request, payload))
                    .await
                    .unwrap();
            }
        }
    }

    async fn connected_client(respond: bool) -> Arc<AdsClient> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(mock_device(listener, respond));

        let (target, source) = addresses();
        let config = AdsClientConfig::new("127.0.0.1", target, source)
            .with_port(port)
            .with_request_timeout(Duration::from_millis(500));
        let client = Arc::new(AdsClient::new(config));
        client.connect().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_interleaved_requests_each_get_their_own_response() {
        let client = connected_client(true).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.read_state().await.unwrap()
            }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            let state = handle.await.unwrap();
            assert_eq!(state.ads_state, AdsState::Run);
            seen.push(state.device_state);
        }

        // every response carried its own invoke id back; none crossed
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 16);
        assert_eq!(client.pending_requests(), 0);

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_mixed_commands_do_not_cross() {
        let client = connected_client(true).await;

        let c1 = client.clone();
        let info = tokio::spawn(async move { c1.read_device_info().await.unwrap() });
        let c2 = client.clone();
        let state = tokio::spawn(async move { c2.read_state().await.unwrap() });

        assert_eq!(info.await.unwrap().device_name, "TC3 PLC");
        assert_eq!(state.await.unwrap().ads_state, AdsState::Run);

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_timeout_clears_pending_entry() {
        let client = connected_client(false).await;

        let err = client.read_state().await.unwrap_err();
        assert!(matches!(err, AdsError::Timeout));
        assert_eq!(client.pending_requests(), 0);

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_requests() {
        let client = connected_client(false).await;

        let c = client.clone();
        let in_flight = tokio::spawn(async move { c.read_state().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        client.disconnect().await.unwrap();
        let err = in_flight.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            AdsError::Disconnecting | AdsError::ChannelInactive
        ));
        assert_eq!(client.pending_requests(), 0);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // accept two consecutive connections
            let (first, _) = listener.accept().await.unwrap();
            drop(first);
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, AmsFrameCodec::tcp());
            while let Some(Ok(request)) = framed.next().await {
                let payload = state_payload(7);
                framed
                    .send(response_frame(&request, payload))
                    .await
                    .unwrap();
            }
        });

        let (target, source) = addresses();
        let config = AdsClientConfig::new("127.0.0.1", target, source)
            .with_port(port)
            .with_request_timeout(Duration::from_millis(500));
        let client = AdsClient::new(config);

        client.connect().await.unwrap();
        client.disconnect().await.unwrap();
        assert!(!client.is_connected());

        client.connect().await.unwrap();
        let state = client.read_state().await.unwrap();
        assert_eq!(state.device_state, 7);
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_without_connection() {
        let (target, source) = addresses();
        let client = AdsClient::new(AdsClientConfig::new("127.0.0.1", target, source));
        let err = client.read_state().await.unwrap_err();
        assert!(matches!(err, AdsError::NotConnected));
    }

    #[tokio::test]
    async fn test_device_error_in_header_is_surfaced() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, AmsFrameCodec::tcp());
            while let Some(Ok(request)) = framed.next().await {
                let mut response = response_frame(&request, Vec::new());
                response.header.error_code = ads_core::AdsErrorCode::new(0x0006);
                framed.send(response).await.unwrap();
            }
        });

        let (target, source) = addresses();
        let config = AdsClientConfig::new("127.0.0.1", target, source).with_port(port);
        let client = AdsClient::new(config);
        client.connect().await.unwrap();

        let err = client.read_state().await.unwrap_err();
        assert!(matches!(err, AdsError::Device(code) if code.code() == 0x0006));
        client.disconnect().await.unwrap();
    }
}
