//! Non-blocking TLS-PSK engine
//!
//! A sans-IO TLS 1.2 client for the pure-PSK cipher suites. The engine
//! consumes ciphertext via [`PskEngine::read_tls`], produces ciphertext
//! via [`PskEngine::take_tls_output`], and exchanges plaintext through
//! [`PskEngine::write_plaintext`] / [`PskEngine::read_plaintext`]. The
//! caller moves bytes between the engine and the socket; see
//! [`PskTransport`](crate::psk::PskTransport) for the tokio driver.
//!
//! # State machine
//!
//! ```text
//! Initial -> Handshaking -> Established -> Closed
//!                 |               |
//!                 +--> Failed <---+
//! ```
//!
//! Handshake completion is observable through
//! [`PskEngine::is_established`]; any failure is returned as an error
//! from the call that detected it and latches the `Failed` state.
//!
//! Plaintext written before the handshake completes is buffered in FIFO
//! order and flushed the moment the server Finished verifies, capped at
//! [`MAX_PENDING_WRITE_BYTES`].

use crate::error::{AdsError, AdsResult, SecureHandshakeError};
use crate::psk::handshake as hs;
use crate::psk::prf;
use crate::psk::record::{
    self, RecordCrypter, CONTENT_ALERT, CONTENT_APPLICATION_DATA, CONTENT_CHANGE_CIPHER_SPEC,
    CONTENT_HANDSHAKE, MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN, RECORD_HEADER_SIZE,
};
use crate::psk::suites::PskCipherSuite;
use bytes::{Buf, Bytes, BytesMut};
use rand::RngCore;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace, warn};

/// Cap on plaintext buffered before the handshake completes
pub const MAX_PENDING_WRITE_BYTES: usize = 256 * 1024;

const ALERT_CLOSE_NOTIFY: u8 = 0;
const ALERT_UNEXPECTED_MESSAGE: u8 = 10;
const ALERT_LEVEL_WARNING: u8 = 1;
const ALERT_HANDSHAKE_FAILURE: u8 = 40;
const ALERT_ILLEGAL_PARAMETER: u8 = 47;
const ALERT_DECRYPT_ERROR: u8 = 51;
const ALERT_PROTOCOL_VERSION: u8 = 70;

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initial,
    Handshaking,
    Established,
    Closed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakePhase {
    ServerHello,
    ServerHelloDone,
    ChangeCipherSpec,
    Finished,
}

/// Sans-IO TLS 1.2 PSK client
pub struct PskEngine {
    identity: Vec<u8>,
    psk: [u8; 32],
    state: EngineState,
    phase: HandshakePhase,
    client_random: [u8; 32],
    server_random: [u8; 32],
    suite: Option<&'static PskCipherSuite>,
    master_secret: Vec<u8>,
    transcript: Vec<u8>,
    recv_buf: BytesMut,
    handshake_buf: Vec<u8>,
    send_buf: BytesMut,
    plaintext_in: BytesMut,
    read_crypter: Option<RecordCrypter>,
    write_crypter: Option<RecordCrypter>,
    pending_read_keys: Option<(Vec<u8>, Vec<u8>)>,
    pending_writes: VecDeque<Vec<u8>>,
    pending_bytes: usize,
}

impl fmt::Debug for PskEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // key material and buffers stay out of debug output
        f.debug_struct("PskEngine")
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("suite", &self.suite.map(|s| s.name))
            .finish()
    }
}

impl PskEngine {
    /// Create an engine for the given identity and 32-byte key
    pub fn new(identity: impl Into<Vec<u8>>, psk: [u8; 32]) -> Self {
        Self {
            identity: identity.into(),
            psk,
            state: EngineState::Initial,
            phase: HandshakePhase::ServerHello,
            client_random: [0u8; 32],
            server_random: [0u8; 32],
            suite: None,
            master_secret: Vec::new(),
            transcript: Vec::new(),
            recv_buf: BytesMut::new(),
            handshake_buf: Vec::new(),
            send_buf: BytesMut::new(),
            plaintext_in: BytesMut::new(),
            read_crypter: None,
            write_crypter: None,
            pending_read_keys: None,
            pending_writes: VecDeque::new(),
            pending_bytes: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Check whether the handshake has completed successfully
    pub fn is_established(&self) -> bool {
        matches!(self.state, EngineState::Established)
    }

    /// Check whether the peer has closed the session
    pub fn is_closed(&self) -> bool {
        matches!(self.state, EngineState::Closed | EngineState::Failed)
    }

    /// Begin the handshake; emits the ClientHello
    ///
    /// Called when the transport becomes active.
    pub fn start(&mut self) -> AdsResult<()> {
        if !matches!(self.state, EngineState::Initial) {
            return Err(AdsError::InvalidData(
                "handshake already started".to_string(),
            ));
        }

        rand::thread_rng().fill_bytes(&mut self.client_random);
        let hello = hs::client_hello(&self.client_random);
        self.transcript.extend_from_slice(&hello);
        self.send_buf
            .extend_from_slice(&record::plain_record(CONTENT_HANDSHAKE, &hello));
        self.state = EngineState::Handshaking;
        trace!("ClientHello queued");
        Ok(())
    }

    /// Feed ciphertext received from the transport
    ///
    /// Drives the handshake while handshaking and decrypts application
    /// data once established. A failure latches the `Failed` state and
    /// is returned to the caller.
    pub fn read_tls(&mut self, input: &[u8]) -> AdsResult<()> {
        if matches!(self.state, EngineState::Failed) {
            return Err(AdsError::ChannelInactive);
        }
        self.recv_buf.extend_from_slice(input);

        loop {
            if matches!(self.state, EngineState::Closed) {
                break;
            }
            if self.recv_buf.len() < RECORD_HEADER_SIZE {
                break;
            }

            let content_type = self.recv_buf[0];
            let major = self.recv_buf[1];
            let length = u16::from_be_bytes([self.recv_buf[3], self.recv_buf[4]]) as usize;
            if major != record::TLS12_MAJOR {
                return Err(self.fail(SecureHandshakeError::ProtocolError(format!(
                    "invalid record version major {}",
                    major
                ))));
            }
            if length > MAX_CIPHERTEXT_LEN {
                return Err(self.fail(SecureHandshakeError::ProtocolError(format!(
                    "record length {} overflows the protocol limit",
                    length
                ))));
            }
            if self.recv_buf.len() < RECORD_HEADER_SIZE + length {
                break;
            }

            self.recv_buf.advance(RECORD_HEADER_SIZE);
            let fragment = self.recv_buf.split_to(length);
            if let Err(e) = self.process_record(content_type, &fragment) {
                return Err(self.fail(e));
            }
        }
        Ok(())
    }

    /// Write plaintext towards the peer
    ///
    /// Before the handshake completes the data is buffered (up to
    /// [`MAX_PENDING_WRITE_BYTES`]); afterwards it is encrypted into the
    /// outgoing record stream immediately. An over-cap write fails
    /// without disturbing previously buffered writes.
    pub fn write_plaintext(&mut self, data: &[u8]) -> AdsResult<()> {
        match self.state {
            EngineState::Initial | EngineState::Handshaking => {
                if self.pending_bytes + data.len() > MAX_PENDING_WRITE_BYTES {
                    return Err(AdsError::InvalidData(format!(
                        "pre-handshake write buffer would exceed {} bytes",
                        MAX_PENDING_WRITE_BYTES
                    )));
                }
                self.pending_bytes += data.len();
                self.pending_writes.push_back(data.to_vec());
                Ok(())
            }
            EngineState::Established => match self.seal_application_data(data) {
                Ok(()) => Ok(()),
                Err(e) => Err(self.fail(e)),
            },
            EngineState::Closed | EngineState::Failed => Err(AdsError::ChannelInactive),
        }
    }

    /// Drain ciphertext destined for the transport
    pub fn take_tls_output(&mut self) -> Option<Bytes> {
        if self.send_buf.is_empty() {
            None
        } else {
            Some(self.send_buf.split().freeze())
        }
    }

    /// Copy decrypted application data into `buf`
    ///
    /// # Returns
    /// Number of bytes copied; 0 if no plaintext is buffered
    pub fn read_plaintext(&mut self, buf: &mut [u8]) -> usize {
        let n = self.plaintext_in.len().min(buf.len());
        if n > 0 {
            buf[..n].copy_from_slice(&self.plaintext_in[..n]);
            self.plaintext_in.advance(n);
        }
        n
    }

    /// The transport reported EOF
    ///
    /// # Returns
    /// The handshake failure cause if the handshake was still running
    pub fn transport_closed(&mut self) -> Option<SecureHandshakeError> {
        match self.state {
            EngineState::Initial | EngineState::Handshaking => {
                self.state = EngineState::Failed;
                Some(SecureHandshakeError::ConnectionClosed(
                    "closed during handshake".to_string(),
                ))
            }
            _ => {
                self.state = EngineState::Closed;
                None
            }
        }
    }

    /// Queue a close_notify alert and close the engine
    pub fn send_close_notify(&mut self) {
        if let (EngineState::Established, Some(crypter)) = (self.state, self.write_crypter.as_mut())
        {
            let alert = [ALERT_LEVEL_WARNING, ALERT_CLOSE_NOTIFY];
            let sealed = crypter.seal(CONTENT_ALERT, &alert);
            self.send_buf.extend_from_slice(&sealed);
        }
        if !matches!(self.state, EngineState::Failed) {
            self.state = EngineState::Closed;
        }
    }

    fn fail(&mut self, cause: SecureHandshakeError) -> AdsError {
        warn!(state = ?self.state, %cause, "TLS-PSK engine failed");
        self.state = EngineState::Failed;
        AdsError::Handshake(cause)
    }

    fn process_record(
        &mut self,
        content_type: u8,
        fragment: &[u8],
    ) -> Result<(), SecureHandshakeError> {
        let payload = if content_type != CONTENT_CHANGE_CIPHER_SPEC {
            match self.read_crypter.as_mut() {
                Some(crypter) => crypter.open(content_type, fragment)?,
                None => fragment.to_vec(),
            }
        } else {
            fragment.to_vec()
        };

        match content_type {
            CONTENT_ALERT => self.process_alert(&payload),
            CONTENT_CHANGE_CIPHER_SPEC => {
                if !matches!(self.state, EngineState::Handshaking)
                    || self.phase != HandshakePhase::ChangeCipherSpec
                {
                    return Err(SecureHandshakeError::ProtocolError(
                        "unexpected ChangeCipherSpec".to_string(),
                    ));
                }
                if payload != [1] {
                    return Err(SecureHandshakeError::ProtocolError(
                        "malformed ChangeCipherSpec".to_string(),
                    ));
                }
                let suite = self.suite.ok_or_else(|| {
                    SecureHandshakeError::InternalError("cipher suite not negotiated".to_string())
                })?;
                let (mac_key, enc_key) = self.pending_read_keys.take().ok_or_else(|| {
                    SecureHandshakeError::InternalError("receive keys not derived".to_string())
                })?;
                self.read_crypter = Some(RecordCrypter::new(suite, mac_key, enc_key));
                self.phase = HandshakePhase::Finished;
                Ok(())
            }
            CONTENT_HANDSHAKE => match self.state {
                EngineState::Handshaking => {
                    self.handshake_buf.extend_from_slice(&payload);
                    self.process_handshake_messages()
                }
                EngineState::Established => {
                    // HelloRequest renegotiation is not supported; ignore
                    trace!("ignoring post-handshake handshake message");
                    Ok(())
                }
                _ => Err(SecureHandshakeError::ProtocolError(
                    "handshake record in unexpected state".to_string(),
                )),
            },
            CONTENT_APPLICATION_DATA => match self.state {
                EngineState::Established => {
                    self.plaintext_in.extend_from_slice(&payload);
                    Ok(())
                }
                _ => Err(SecureHandshakeError::ProtocolError(
                    "application data before handshake completion".to_string(),
                )),
            },
            other => Err(SecureHandshakeError::ProtocolError(format!(
                "unknown record type {}",
                other
            ))),
        }
    }

    fn process_alert(&mut self, payload: &[u8]) -> Result<(), SecureHandshakeError> {
        if payload.len() < 2 {
            return Err(SecureHandshakeError::ProtocolError(
                "malformed alert".to_string(),
            ));
        }
        let level = payload[0];
        let description = payload[1];

        if description == ALERT_CLOSE_NOTIFY {
            return if matches!(self.state, EngineState::Established) {
                debug!("peer sent close_notify");
                self.state = EngineState::Closed;
                Ok(())
            } else {
                Err(SecureHandshakeError::ConnectionClosed(
                    "close_notify during handshake".to_string(),
                ))
            };
        }
        if level == ALERT_LEVEL_WARNING {
            debug!(description, "ignoring warning alert");
            return Ok(());
        }

        Err(match description {
            ALERT_HANDSHAKE_FAILURE => SecureHandshakeError::NoCompatibleSuite,
            ALERT_DECRYPT_ERROR => SecureHandshakeError::AuthenticationFailed,
            ALERT_UNEXPECTED_MESSAGE | ALERT_ILLEGAL_PARAMETER | ALERT_PROTOCOL_VERSION => {
                SecureHandshakeError::ProtocolError(format!("fatal alert {}", description))
            }
            other => SecureHandshakeError::Unknown(other),
        })
    }

    fn process_handshake_messages(&mut self) -> Result<(), SecureHandshakeError> {
        while !matches!(self.state, EngineState::Established) {
            if self.handshake_buf.len() < hs::HS_HEADER_SIZE {
                return Ok(());
            }
            let body_len = u32::from_be_bytes([
                0,
                self.handshake_buf[1],
                self.handshake_buf[2],
                self.handshake_buf[3],
            ]) as usize;
            let total = hs::HS_HEADER_SIZE + body_len;
            if self.handshake_buf.len() < total {
                return Ok(());
            }

            let raw: Vec<u8> = self.handshake_buf.drain(..total).collect();
            let msg_type = raw[0];
            self.process_handshake_message(msg_type, &raw)?;
        }
        Ok(())
    }

    fn process_handshake_message(
        &mut self,
        msg_type: u8,
        raw: &[u8],
    ) -> Result<(), SecureHandshakeError> {
        let body = &raw[hs::HS_HEADER_SIZE..];

        match (self.phase, msg_type) {
            (HandshakePhase::ServerHello, hs::HS_SERVER_HELLO) => {
                let hello = hs::parse_server_hello(body)?;
                self.server_random = hello.random;
                self.suite = Some(hello.suite);
                self.transcript.extend_from_slice(raw);
                self.phase = HandshakePhase::ServerHelloDone;
                debug!(suite = hello.suite.name, "cipher suite negotiated");
                Ok(())
            }
            (HandshakePhase::ServerHelloDone, hs::HS_SERVER_KEY_EXCHANGE) => {
                let hint = hs::parse_server_key_exchange(body)?;
                trace!(hint_len = hint.len(), "ignoring PSK identity hint");
                self.transcript.extend_from_slice(raw);
                Ok(())
            }
            (HandshakePhase::ServerHelloDone, hs::HS_SERVER_HELLO_DONE) => {
                self.transcript.extend_from_slice(raw);
                self.complete_key_exchange()
            }
            (HandshakePhase::Finished, hs::HS_FINISHED) => {
                let suite = self.suite.ok_or_else(|| {
                    SecureHandshakeError::InternalError("cipher suite not negotiated".to_string())
                })?;
                let hash = prf::transcript_hash(suite.prf, &self.transcript);
                let expected = prf::prf(
                    suite.prf,
                    &self.master_secret,
                    b"server finished",
                    &hash,
                    prf::VERIFY_DATA_LEN,
                );
                if body != expected.as_slice() {
                    return Err(SecureHandshakeError::AuthenticationFailed);
                }
                self.transcript.extend_from_slice(raw);
                self.state = EngineState::Established;
                debug!("TLS-PSK handshake complete");
                self.flush_pending_writes()
            }
            (_, other) => Err(SecureHandshakeError::ProtocolError(format!(
                "unexpected handshake message {}",
                other
            ))),
        }
    }

    fn complete_key_exchange(&mut self) -> Result<(), SecureHandshakeError> {
        let suite = self.suite.ok_or_else(|| {
            SecureHandshakeError::InternalError("cipher suite not negotiated".to_string())
        })?;

        let cke = hs::client_key_exchange(&self.identity);
        self.transcript.extend_from_slice(&cke);
        self.send_buf
            .extend_from_slice(&record::plain_record(CONTENT_HANDSHAKE, &cke));

        let premaster = prf::premaster_secret(&self.psk);
        self.master_secret = prf::master_secret(
            suite.prf,
            &premaster,
            &self.client_random,
            &self.server_random,
        );
        let keys = prf::key_block(
            suite,
            &self.master_secret,
            &self.client_random,
            &self.server_random,
        );
        self.pending_read_keys = Some((keys.server_mac_key, keys.server_enc_key));

        // ChangeCipherSpec switches the write direction to the new keys
        self.send_buf
            .extend_from_slice(&record::plain_record(CONTENT_CHANGE_CIPHER_SPEC, &[1]));
        let mut write_crypter =
            RecordCrypter::new(suite, keys.client_mac_key, keys.client_enc_key);

        let hash = prf::transcript_hash(suite.prf, &self.transcript);
        let verify = prf::prf(
            suite.prf,
            &self.master_secret,
            b"client finished",
            &hash,
            prf::VERIFY_DATA_LEN,
        );
        let finished = hs::message(hs::HS_FINISHED, &verify);
        self.transcript.extend_from_slice(&finished);
        self.send_buf
            .extend_from_slice(&write_crypter.seal(CONTENT_HANDSHAKE, &finished));
        self.write_crypter = Some(write_crypter);

        self.phase = HandshakePhase::ChangeCipherSpec;
        Ok(())
    }

    fn flush_pending_writes(&mut self) -> Result<(), SecureHandshakeError> {
        let writes: Vec<Vec<u8>> = self.pending_writes.drain(..).collect();
        self.pending_bytes = 0;
        for data in writes {
            self.seal_application_data(&data)?;
        }
        Ok(())
    }

    fn seal_application_data(&mut self, data: &[u8]) -> Result<(), SecureHandshakeError> {
        let crypter = self.write_crypter.as_mut().ok_or_else(|| {
            SecureHandshakeError::InternalError("write keys not active".to_string())
        })?;
        for chunk in data.chunks(MAX_PLAINTEXT_LEN) {
            let sealed = crypter.seal(CONTENT_APPLICATION_DATA, chunk);
            self.send_buf.extend_from_slice(&sealed);
        }
        Ok(())
    }
}
