//! TLS 1.2 record layer for the PSK engine
//!
//! The offered suites are all CBC with HMAC, so records are protected
//! mac-then-encrypt with an explicit per-record IV (RFC 5246 section
//! 6.2.3.2).

use crate::error::SecureHandshakeError;
use crate::psk::suites::{MacAlgorithm, PskCipherSuite};
use cipher::block_padding::NoPadding;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

/// Record content types
pub const CONTENT_CHANGE_CIPHER_SPEC: u8 = 20;
pub const CONTENT_ALERT: u8 = 21;
pub const CONTENT_HANDSHAKE: u8 = 22;
pub const CONTENT_APPLICATION_DATA: u8 = 23;

/// Wire version of TLS 1.2
pub const TLS12_MAJOR: u8 = 3;
pub const TLS12_MINOR: u8 = 3;

/// Size of the record header
pub const RECORD_HEADER_SIZE: usize = 5;

/// Largest plaintext fragment per record
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Largest protected fragment the peer may send
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 2048;

const AES_BLOCK_SIZE: usize = 16;

/// Emit an unprotected record
pub fn plain_record(content_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
    out.push(content_type);
    out.push(TLS12_MAJOR);
    out.push(TLS12_MINOR);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// One direction of an active CBC/HMAC record protection
pub struct RecordCrypter {
    suite: &'static PskCipherSuite,
    mac_key: Vec<u8>,
    enc_key: Vec<u8>,
    seq: u64,
}

impl RecordCrypter {
    /// Create a crypter; sequence numbers start at zero after
    /// ChangeCipherSpec
    pub fn new(suite: &'static PskCipherSuite, mac_key: Vec<u8>, enc_key: Vec<u8>) -> Self {
        Self {
            suite,
            mac_key,
            enc_key,
            seq: 0,
        }
    }

    /// Protect a plaintext fragment into a complete record
    pub fn seal(&mut self, content_type: u8, plaintext: &[u8]) -> Vec<u8> {
        debug_assert!(plaintext.len() <= MAX_PLAINTEXT_LEN);

        let mac = self.record_mac(content_type, plaintext);

        // plaintext || MAC || padding, padded to the block size
        let mut data = Vec::with_capacity(plaintext.len() + mac.len() + AES_BLOCK_SIZE);
        data.extend_from_slice(plaintext);
        data.extend_from_slice(&mac);
        let pad_len = AES_BLOCK_SIZE - ((data.len() + 1) % AES_BLOCK_SIZE);
        let pad_len = pad_len % AES_BLOCK_SIZE;
        for _ in 0..=pad_len {
            data.push(pad_len as u8);
        }

        let mut iv = [0u8; AES_BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        let ciphertext = cbc_encrypt(&self.enc_key, &iv, &data);

        let mut fragment = Vec::with_capacity(AES_BLOCK_SIZE + ciphertext.len());
        fragment.extend_from_slice(&iv);
        fragment.extend_from_slice(&ciphertext);

        self.seq += 1;
        plain_record(content_type, &fragment)
    }

    /// Verify and strip the protection of a record fragment
    pub fn open(
        &mut self,
        content_type: u8,
        fragment: &[u8],
    ) -> Result<Vec<u8>, SecureHandshakeError> {
        if fragment.len() < 2 * AES_BLOCK_SIZE || (fragment.len() - AES_BLOCK_SIZE) % AES_BLOCK_SIZE != 0
        {
            return Err(SecureHandshakeError::ProtocolError(format!(
                "invalid record fragment length {}",
                fragment.len()
            )));
        }

        let (iv, ciphertext) = fragment.split_at(AES_BLOCK_SIZE);
        let mut data = cbc_decrypt(&self.enc_key, iv, ciphertext)?;

        // strip and validate padding
        let pad_len = *data.last().expect("fragment is non-empty") as usize;
        if pad_len + 1 > data.len()
            || !data[data.len() - pad_len - 1..].iter().all(|&b| b == pad_len as u8)
        {
            return Err(SecureHandshakeError::AuthenticationFailed);
        }
        data.truncate(data.len() - pad_len - 1);

        let mac_len = self.suite.mac.mac_len();
        if data.len() < mac_len {
            return Err(SecureHandshakeError::AuthenticationFailed);
        }
        let plaintext_len = data.len() - mac_len;
        let mac = data.split_off(plaintext_len);

        let expected = self.record_mac(content_type, &data);
        if mac != expected {
            return Err(SecureHandshakeError::AuthenticationFailed);
        }

        self.seq += 1;
        Ok(data)
    }

    fn record_mac(&self, content_type: u8, plaintext: &[u8]) -> Vec<u8> {
        let mut header = [0u8; 13];
        header[0..8].copy_from_slice(&self.seq.to_be_bytes());
        header[8] = content_type;
        header[9] = TLS12_MAJOR;
        header[10] = TLS12_MINOR;
        header[11..13].copy_from_slice(&(plaintext.len() as u16).to_be_bytes());
        compute_hmac(self.suite.mac, &self.mac_key, &[&header, plaintext])
    }
}

pub(crate) fn compute_hmac(alg: MacAlgorithm, key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    match alg {
        MacAlgorithm::Sha1 => hmac_parts::<Hmac<Sha1>>(key, parts),
        MacAlgorithm::Sha256 => hmac_parts::<Hmac<Sha256>>(key, parts),
        MacAlgorithm::Sha384 => hmac_parts::<Hmac<Sha384>>(key, parts),
    }
}

fn hmac_parts<M: Mac + hmac::digest::KeyInit>(key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

fn cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    match key.len() {
        16 => cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
            .expect("key and IV lengths are fixed by the suite")
            .encrypt_padded_vec_mut::<NoPadding>(data),
        32 => cbc::Encryptor::<aes::Aes256>::new_from_slices(key, iv)
            .expect("key and IV lengths are fixed by the suite")
            .encrypt_padded_vec_mut::<NoPadding>(data),
        len => unreachable!("unsupported AES key length {}", len),
    }
}

fn cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, SecureHandshakeError> {
    let result = match key.len() {
        16 => cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
            .expect("key and IV lengths are fixed by the suite")
            .decrypt_padded_vec_mut::<NoPadding>(data),
        32 => cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
            .expect("key and IV lengths are fixed by the suite")
            .decrypt_padded_vec_mut::<NoPadding>(data),
        len => unreachable!("unsupported AES key length {}", len),
    };
    result.map_err(|_| SecureHandshakeError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psk::suites::{TLS_PSK_WITH_AES_128_CBC_SHA256, TLS_PSK_WITH_AES_256_CBC_SHA384};

    fn crypter_pair(suite: &'static PskCipherSuite) -> (RecordCrypter, RecordCrypter) {
        let mac_key = vec![0x11; suite.mac.key_len()];
        let enc_key = vec![0x22; suite.enc_key_len];
        (
            RecordCrypter::new(suite, mac_key.clone(), enc_key.clone()),
            RecordCrypter::new(suite, mac_key, enc_key),
        )
    }

    #[test]
    fn test_seal_open_round_trip() {
        let (mut seal, mut open) = crypter_pair(&TLS_PSK_WITH_AES_128_CBC_SHA256);
        let plaintext = b"application payload";

        let record = seal.seal(CONTENT_APPLICATION_DATA, plaintext);
        assert_eq!(record[0], CONTENT_APPLICATION_DATA);
        assert_eq!(&record[1..3], &[TLS12_MAJOR, TLS12_MINOR]);

        let fragment = &record[RECORD_HEADER_SIZE..];
        let decrypted = open.open(CONTENT_APPLICATION_DATA, fragment).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_sequence_number_is_authenticated() {
        let (mut seal, mut open) = crypter_pair(&TLS_PSK_WITH_AES_256_CBC_SHA384);

        let first = seal.seal(CONTENT_APPLICATION_DATA, b"one");
        let second = seal.seal(CONTENT_APPLICATION_DATA, b"two");

        // Delivering the second record first fails the MAC
        let err = open
            .open(CONTENT_APPLICATION_DATA, &second[RECORD_HEADER_SIZE..])
            .unwrap_err();
        assert_eq!(err, SecureHandshakeError::AuthenticationFailed);

        // A fresh receiver in sequence succeeds
        let (_, mut open) = crypter_pair(&TLS_PSK_WITH_AES_256_CBC_SHA384);
        assert_eq!(
            open.open(CONTENT_APPLICATION_DATA, &first[RECORD_HEADER_SIZE..])
                .unwrap(),
            b"one"
        );
        assert_eq!(
            open.open(CONTENT_APPLICATION_DATA, &second[RECORD_HEADER_SIZE..])
                .unwrap(),
            b"two"
        );
    }

    #[test]
    fn test_tampered_record_fails() {
        let (mut seal, mut open) = crypter_pair(&TLS_PSK_WITH_AES_128_CBC_SHA256);
        let mut record = seal.seal(CONTENT_APPLICATION_DATA, b"payload");
        let last = record.len() - 1;
        record[last] ^= 0x01;

        assert!(open
            .open(CONTENT_APPLICATION_DATA, &record[RECORD_HEADER_SIZE..])
            .is_err());
    }

    #[test]
    fn test_short_fragment_rejected() {
        let (_, mut open) = crypter_pair(&TLS_PSK_WITH_AES_128_CBC_SHA256);
        assert!(matches!(
            open.open(CONTENT_APPLICATION_DATA, &[0u8; 16]),
            Err(SecureHandshakeError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_plain_record_layout() {
        let record = plain_record(CONTENT_HANDSHAKE, &[1, 2, 3]);
        assert_eq!(record, vec![22, 3, 3, 0, 3, 1, 2, 3]);
    }
}
