//! AES-256-GCM sealing used for chunk data and the chunk-id list.
//! Blob layout: `nonce (12) ‖ ciphertext ‖ tag (16)`, fresh random nonce per call.

use crate::error::{Result, VaultError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// The per-vault sealing key. Never leaves the process in the clear.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| VaultError::WireFormat(format!("sealing key must be {KEY_LEN} bytes, got {}", bytes.len())))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| VaultError::Crypto(format!("Encryption failed: {e:?}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::DecryptionFailed);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let key = SymmetricKey::generate();
        let blob = key.encrypt(b"chunk bytes").unwrap();
        assert_eq!(blob.len(), NONCE_LEN + 11 + TAG_LEN);
        assert_eq!(key.decrypt(&blob).unwrap(), b"chunk bytes");
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = SymmetricKey::generate();
        let a = key.encrypt(b"same").unwrap();
        let b = key.encrypt(b"same").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = SymmetricKey::generate().encrypt(b"data").unwrap();
        assert!(matches!(
            SymmetricKey::generate().decrypt(&blob),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_from_bytes_checks_length() {
        assert!(SymmetricKey::from_bytes(&[0u8; 31]).is_err());
        let key = SymmetricKey::from_bytes(&[9u8; 32]).unwrap();
        assert_eq!(key.as_bytes(), &[9u8; 32]);
        assert!(!format!("{key:?}").contains('9'));
    }
}
