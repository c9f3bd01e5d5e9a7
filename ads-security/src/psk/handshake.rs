//! TLS 1.2 handshake messages for plain PSK key exchange
//!
//! Only the client side of the flow is implemented: ClientHello,
//! ClientKeyExchange and Finished out, ServerHello, ServerKeyExchange
//! (identity hint, ignored) and ServerHelloDone in.

use crate::error::SecureHandshakeError;
use crate::psk::suites::{self, OFFERED_SUITES};

pub const HS_CLIENT_HELLO: u8 = 1;
pub const HS_SERVER_HELLO: u8 = 2;
pub const HS_SERVER_KEY_EXCHANGE: u8 = 12;
pub const HS_SERVER_HELLO_DONE: u8 = 14;
pub const HS_CLIENT_KEY_EXCHANGE: u8 = 16;
pub const HS_FINISHED: u8 = 20;

/// Size of the handshake message header (type + u24 length)
pub const HS_HEADER_SIZE: usize = 4;

/// Wrap a message body in the handshake header
pub fn message(msg_type: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HS_HEADER_SIZE + body.len());
    out.push(msg_type);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

/// Build the ClientHello
///
/// TLS 1.2 only, the four pure-PSK suites in preference order, null
/// compression, and no extensions block at all: the TwinCAT peer aborts
/// on any ClientHello extension it does not recognize.
pub fn client_hello(client_random: &[u8; 32]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + 32 + 1 + 2 + 2 * OFFERED_SUITES.len() + 2);
    body.push(3);
    body.push(3);
    body.extend_from_slice(client_random);
    // empty session id
    body.push(0);
    body.extend_from_slice(&((2 * OFFERED_SUITES.len()) as u16).to_be_bytes());
    for suite in OFFERED_SUITES {
        body.extend_from_slice(&suite.id.to_be_bytes());
    }
    // null compression only
    body.push(1);
    body.push(0);
    // no extensions field
    message(HS_CLIENT_HELLO, &body)
}

/// Relevant fields of a ServerHello
#[derive(Debug)]
pub struct ServerHello {
    pub random: [u8; 32],
    pub suite: &'static suites::PskCipherSuite,
}

/// Parse a ServerHello body
pub fn parse_server_hello(body: &[u8]) -> Result<ServerHello, SecureHandshakeError> {
    if body.len() < 2 + 32 + 1 {
        return Err(SecureHandshakeError::ProtocolError(
            "ServerHello too short".to_string(),
        ));
    }
    if body[0] != 3 || body[1] != 3 {
        return Err(SecureHandshakeError::ProtocolError(format!(
            "server selected protocol version {}.{}",
            body[0], body[1]
        )));
    }

    let mut random = [0u8; 32];
    random.copy_from_slice(&body[2..34]);

    let session_id_len = body[34] as usize;
    if session_id_len > 32 || body.len() < 35 + session_id_len + 3 {
        return Err(SecureHandshakeError::ProtocolError(
            "ServerHello truncated".to_string(),
        ));
    }
    let rest = &body[35 + session_id_len..];

    let suite_id = u16::from_be_bytes([rest[0], rest[1]]);
    let suite = suites::from_id(suite_id).ok_or_else(|| {
        SecureHandshakeError::ProtocolError(format!(
            "server selected cipher suite 0x{:04X} which was not offered",
            suite_id
        ))
    })?;

    let compression = rest[2];
    if compression != 0 {
        return Err(SecureHandshakeError::ProtocolError(format!(
            "server selected compression method {}",
            compression
        )));
    }

    // any trailing extension bytes are ignored
    Ok(ServerHello { random, suite })
}

/// Parse a ServerKeyExchange body into the PSK identity hint
///
/// RFC 4279 allows the client to disregard the hint; TwinCAT sends an
/// empty one.
pub fn parse_server_key_exchange(body: &[u8]) -> Result<Vec<u8>, SecureHandshakeError> {
    if body.len() < 2 {
        return Err(SecureHandshakeError::ProtocolError(
            "ServerKeyExchange too short".to_string(),
        ));
    }
    let hint_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    if body.len() < 2 + hint_len {
        return Err(SecureHandshakeError::ProtocolError(
            "ServerKeyExchange truncated".to_string(),
        ));
    }
    Ok(body[2..2 + hint_len].to_vec())
}

/// Build the ClientKeyExchange carrying the PSK identity verbatim
pub fn client_key_exchange(identity: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + identity.len());
    body.extend_from_slice(&(identity.len() as u16).to_be_bytes());
    body.extend_from_slice(identity);
    message(HS_CLIENT_KEY_EXCHANGE, &body)
}
