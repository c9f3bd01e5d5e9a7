//! TLS 1.2 pseudo-random function and key derivation

use crate::psk::suites::{PrfHash, PskCipherSuite};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384};

/// Length of the TLS master secret
pub const MASTER_SECRET_LEN: usize = 48;

/// Length of a Finished verify_data field
pub const VERIFY_DATA_LEN: usize = 12;

/// TLS 1.2 PRF (RFC 5246 section 5)
pub fn prf(hash: PrfHash, secret: &[u8], label: &[u8], seed: &[u8], out_len: usize) -> Vec<u8> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    match hash {
        PrfHash::Sha256 => p_hash::<Hmac<Sha256>>(secret, &label_seed, out_len),
        PrfHash::Sha384 => p_hash::<Hmac<Sha384>>(secret, &label_seed, out_len),
    }
}

fn p_hash<M: Mac + hmac::digest::KeyInit>(
    secret: &[u8],
    label_seed: &[u8],
    out_len: usize,
) -> Vec<u8> {
    let hmac = |parts: &[&[u8]]| {
        let mut mac = <M as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
        for part in parts {
            mac.update(part);
        }
        mac.finalize().into_bytes().to_vec()
    };

    let mut out = Vec::with_capacity(out_len);
    // A(1) = HMAC(secret, seed); A(i) = HMAC(secret, A(i-1))
    let mut a = hmac(&[label_seed]);
    while out.len() < out_len {
        out.extend_from_slice(&hmac(&[&a, label_seed]));
        a = hmac(&[&a]);
    }
    out.truncate(out_len);
    out
}

/// Premaster secret for plain PSK key exchange (RFC 4279 section 2)
///
/// `other_secret` is all zeros of the PSK's length for plain PSK.
pub fn premaster_secret(psk: &[u8]) -> Vec<u8> {
    let n = psk.len() as u16;
    let mut out = Vec::with_capacity(4 + 2 * psk.len());
    out.extend_from_slice(&n.to_be_bytes());
    out.resize(2 + psk.len(), 0);
    out.extend_from_slice(&n.to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// Master secret from the premaster secret and both hello randoms
pub fn master_secret(
    hash: PrfHash,
    premaster: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Vec<u8> {
    let mut randoms = Vec::with_capacity(64);
    randoms.extend_from_slice(client_random);
    randoms.extend_from_slice(server_random);
    prf(hash, premaster, b"master secret", &randoms, MASTER_SECRET_LEN)
}

/// Per-connection key material, split from the TLS key block
#[derive(Clone)]
pub struct SessionKeys {
    pub client_mac_key: Vec<u8>,
    pub server_mac_key: Vec<u8>,
    pub client_enc_key: Vec<u8>,
    pub server_enc_key: Vec<u8>,
}

/// Expand the key block for a CBC suite (no fixed IVs in TLS 1.2)
pub fn key_block(
    suite: &PskCipherSuite,
    master: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> SessionKeys {
    // key expansion seeds with server_random first
    let mut randoms = Vec::with_capacity(64);
    randoms.extend_from_slice(server_random);
    randoms.extend_from_slice(client_random);

    let mac_len = suite.mac.key_len();
    let enc_len = suite.enc_key_len;
    let block = prf(
        suite.prf,
        master,
        b"key expansion",
        &randoms,
        2 * mac_len + 2 * enc_len,
    );

    SessionKeys {
        client_mac_key: block[0..mac_len].to_vec(),
        server_mac_key: block[mac_len..2 * mac_len].to_vec(),
        client_enc_key: block[2 * mac_len..2 * mac_len + enc_len].to_vec(),
        server_enc_key: block[2 * mac_len + enc_len..2 * mac_len + 2 * enc_len].to_vec(),
    }
}

/// Hash of the handshake transcript for the Finished computation
pub fn transcript_hash(hash: PrfHash, transcript: &[u8]) -> Vec<u8> {
    match hash {
        PrfHash::Sha256 => Sha256::digest(transcript).to_vec(),
        PrfHash::Sha384 => Sha384::digest(transcript).to_vec(),
    }
}
