//! Password-based sealing of export payloads.
//!
//! PBKDF2-HMAC-SHA256 (100 000 rounds, 16-byte salt) derives an AES-256-GCM
//! key; the 12-byte IV is random per seal. Parameters match what earlier
//! exports used, so old files stay readable.

use aes_gcm::aead::{Aead, OsRng, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const KDF_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed")]
    Encrypt,
    /// Wrong password and damaged ciphertext are deliberately the same error.
    #[error("Decryption failed: wrong password or corrupted data")]
    Decrypt,
}

/// Sealed payload as written to disk: three plain byte arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

pub fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut key);
    key
}

/// Encrypt `plaintext` under a key derived from `password` with fresh salt and IV.
pub fn seal(plaintext: &[u8], password: &str) -> Result<Envelope, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt);
    seal_with_key(plaintext, &salt, &key)
}

/// Encrypt with an already derived key. A new IV is drawn on every call.
pub fn seal_with_key(
    plaintext: &[u8],
    salt: &[u8],
    key: &[u8; KEY_LEN],
) -> Result<Envelope, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| CryptoError::Encrypt)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    Ok(Envelope {
        salt: salt.to_vec(),
        iv: iv.to_vec(),
        ciphertext,
    })
}

/// Authenticate and decrypt an envelope with `password`.
pub fn open(envelope: &Envelope, password: &str) -> Result<Vec<u8>, CryptoError> {
    let key = derive_key(password, &envelope.salt);
    open_with_key(envelope, &key)
}

pub fn open_with_key(envelope: &Envelope, key: &[u8; KEY_LEN]) -> Result<Vec<u8>, CryptoError> {
    if envelope.iv.len() != IV_LEN {
        return Err(CryptoError::Decrypt);
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| CryptoError::Decrypt)?;
    cipher
        .decrypt(Nonce::from_slice(envelope.iv.as_slice()), envelope.ciphertext.as_slice())
        .map_err(|_| CryptoError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open() {
        let envelope = seal(b"[1,2,3]", "hunter2").unwrap();
        assert_eq!(envelope.salt.len(), SALT_LEN);
        assert_eq!(envelope.iv.len(), IV_LEN);
        // 16-byte GCM tag is appended
        assert_eq!(envelope.ciphertext.len(), 7 + 16);
        assert_eq!(open(&envelope, "hunter2").unwrap(), b"[1,2,3]");
    }

    #[test]
    fn wrong_password_fails() {
        let envelope = seal(b"secret", "right").unwrap();
        assert_eq!(open(&envelope, "wrong"), Err(CryptoError::Decrypt));
    }

    #[test]
    fn key_derivation_is_deterministic_per_salt() {
        let salt = [7u8; SALT_LEN];
        assert_eq!(derive_key("pw", &salt), derive_key("pw", &salt));
        assert_ne!(derive_key("pw", &salt), derive_key("pw", &[8u8; SALT_LEN]));
        assert_ne!(derive_key("pw", &salt), derive_key("pW", &salt));
    }

    #[test]
    fn every_byte_is_authenticated() {
        let salt = [1u8; SALT_LEN];
        let key = derive_key("pw", &salt);
        let envelope = seal_with_key(b"{\"ideas\":[]}", &salt, &key).unwrap();

        for i in 0..envelope.ciphertext.len() {
            let mut tampered = envelope.clone();
            tampered.ciphertext[i] ^= 0x01;
            assert_eq!(open_with_key(&tampered, &key), Err(CryptoError::Decrypt), "byte {i}");
        }

        let mut bad_iv = envelope.clone();
        bad_iv.iv[0] ^= 0x80;
        assert_eq!(open_with_key(&bad_iv, &key), Err(CryptoError::Decrypt));
    }

    #[test]
    fn salt_and_iv_are_fresh_each_time() {
        let salt = [2u8; SALT_LEN];
        let key = derive_key("pw", &salt);
        let a = seal_with_key(b"same", &salt, &key).unwrap();
        let b = seal_with_key(b"same", &salt, &key).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);

        let c = seal(b"same", "pw").unwrap();
        let d = seal(b"same", "pw").unwrap();
        assert_ne!(c.salt, d.salt);
    }

    #[test]
    fn malformed_iv_is_rejected_without_panicking() {
        let key = derive_key("pw", &[0u8; SALT_LEN]);
        let envelope = Envelope {
            salt: vec![0; SALT_LEN],
            iv: vec![0; 5],
            ciphertext: vec![0; 32],
        };
        assert_eq!(open_with_key(&envelope, &key), Err(CryptoError::Decrypt));
    }
}
