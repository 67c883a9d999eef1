//! One-sender, one-recipient envelope over every supported curve.
//!
//! Wire layout: `ephemeral_key (32) ‖ nonce (24) ‖ XChaCha20-Poly1305(ciphertext ‖ tag)`.
//! The AEAD key is `SHA-256(shared_secret)` and the ephemeral key is bound as associated data.
//! secp256k1 ephemeral keys always have an even Y, so only the x-coordinate is transmitted and
//! every curve carries the same overhead.

use crate::crypto::keys::{PublicKey, SecretKey};
use crate::error::{Result, VaultError};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_POINT, ristretto::CompressedRistretto, scalar::Scalar};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

pub const EPHEMERAL_KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// Bytes added to a message by [`encrypt`], identical for every curve.
pub const ENVELOPE_OVERHEAD: usize = EPHEMERAL_KEY_LEN + NONCE_LEN + TAG_LEN;

const SEC1_EVEN_TAG: u8 = 0x02;

/// Derive the public key matching `secret` on its own curve.
pub fn get_public_key(secret: &SecretKey) -> Result<PublicKey> {
    secret.public_key()
}

/// Encrypt `message` to `recipient` under a fresh ephemeral key.
pub fn encrypt(message: &[u8], recipient: &PublicKey) -> Result<Vec<u8>> {
    let (ephemeral, shared) = agree_as_sender(recipient)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let body = aead(&shared)
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: message, aad: &ephemeral })
        .map_err(|_| VaultError::Crypto("envelope encryption failed".into()))?;

    let mut out = Vec::with_capacity(ENVELOPE_OVERHEAD + message.len());
    out.extend_from_slice(&ephemeral);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Open an envelope produced by [`encrypt`].
///
/// Every failure, whether a wrong key, a truncated envelope or a forged tag, is reported as
/// [`VaultError::DecryptionFailed`].
pub fn decrypt(secret: &SecretKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < ENVELOPE_OVERHEAD {
        return Err(VaultError::DecryptionFailed);
    }

    let (ephemeral, rest) = ciphertext.split_at(EPHEMERAL_KEY_LEN);
    let (nonce, body) = rest.split_at(NONCE_LEN);

    let mut ephemeral_key = [0u8; EPHEMERAL_KEY_LEN];
    ephemeral_key.copy_from_slice(ephemeral);

    let shared = agree_as_recipient(secret, &ephemeral_key).ok_or(VaultError::DecryptionFailed)?;

    aead(&shared)
        .decrypt(XNonce::from_slice(nonce), Payload { msg: body, aad: ephemeral })
        .map_err(|_| VaultError::DecryptionFailed)
}

fn aead(shared: &[u8; 32]) -> XChaCha20Poly1305 {
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&Sha256::digest(shared));
    XChaCha20Poly1305::new(Key::from_slice(&key[..]))
}

/// Returns the transmitted ephemeral key and the shared secret.
fn agree_as_sender(recipient: &PublicKey) -> Result<([u8; EPHEMERAL_KEY_LEN], Zeroizing<[u8; 32]>)> {
    match recipient {
        PublicKey::Ed25519(key) => {
            let ephemeral = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
            let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);
            let shared = ephemeral.diffie_hellman(&x25519_dalek::PublicKey::from(*key));
            if !shared.was_contributory() {
                return Err(VaultError::InvalidKey("ed25519 recipient key has low order".into()));
            }
            Ok((ephemeral_public.to_bytes(), Zeroizing::new(shared.to_bytes())))
        }
        PublicKey::Sr25519(key) => {
            let point = CompressedRistretto(*key)
                .decompress()
                .ok_or_else(|| VaultError::InvalidKey("sr25519 public key is not a ristretto point".into()))?;

            let mut wide = [0u8; 64];
            OsRng.fill_bytes(&mut wide);
            let mut scalar = Scalar::from_bytes_mod_order_wide(&wide);
            wide.zeroize();

            let ephemeral_public = (RISTRETTO_BASEPOINT_POINT * scalar).compress().to_bytes();
            let shared = (point * scalar).compress().to_bytes();
            scalar.zeroize();

            if shared == [0u8; 32] {
                return Err(VaultError::InvalidKey("sr25519 recipient key is the identity".into()));
            }
            Ok((ephemeral_public, Zeroizing::new(shared)))
        }
        PublicKey::Secp256k1(key) => {
            let their = k256::PublicKey::from_sec1_bytes(key)
                .map_err(|_| VaultError::InvalidKey("secp256k1 public key is not on the curve".into()))?;

            // redraw until the point has an even Y so the x-coordinate alone identifies it
            let (ephemeral, encoded) = loop {
                let candidate = k256::SecretKey::random(&mut OsRng);
                let encoded = candidate.public_key().to_encoded_point(true);
                if encoded.as_bytes()[0] == SEC1_EVEN_TAG {
                    break (candidate, encoded);
                }
            };

            let shared = k256::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), their.as_affine());
            let mut secret = Zeroizing::new([0u8; 32]);
            secret.copy_from_slice(shared.raw_secret_bytes());

            let mut ephemeral_x = [0u8; EPHEMERAL_KEY_LEN];
            ephemeral_x.copy_from_slice(&encoded.as_bytes()[1..]);
            Ok((ephemeral_x, secret))
        }
    }
}

fn agree_as_recipient(secret: &SecretKey, ephemeral: &[u8; EPHEMERAL_KEY_LEN]) -> Option<Zeroizing<[u8; 32]>> {
    match secret {
        SecretKey::Ed25519(key) => {
            let ours = x25519_dalek::StaticSecret::from(*key);
            let shared = ours.diffie_hellman(&x25519_dalek::PublicKey::from(*ephemeral));
            shared.was_contributory().then(|| Zeroizing::new(shared.to_bytes()))
        }
        SecretKey::Sr25519(_) => {
            let mut scalar = secret.sr25519_scalar().ok()?;
            let point = CompressedRistretto(*ephemeral).decompress()?;
            let shared = (point * scalar).compress().to_bytes();
            scalar.zeroize();
            (shared != [0u8; 32]).then(|| Zeroizing::new(shared))
        }
        SecretKey::Secp256k1(key) => {
            let ours = k256::SecretKey::from_slice(key).ok()?;

            let mut sec1 = [0u8; 1 + EPHEMERAL_KEY_LEN];
            sec1[0] = SEC1_EVEN_TAG;
            sec1[1..].copy_from_slice(ephemeral);
            let theirs = k256::PublicKey::from_sec1_bytes(&sec1).ok()?;

            let shared = k256::ecdh::diffie_hellman(ours.to_nonzero_scalar(), theirs.as_affine());
            let mut out = Zeroizing::new([0u8; 32]);
            out.copy_from_slice(shared.raw_secret_bytes());
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{CurveType, KeyPair};

    const CURVES: [CurveType; 3] = [CurveType::Ed25519, CurveType::Sr25519, CurveType::Secp256k1];

    #[test]
    fn test_round_trip_every_curve() {
        for curve in CURVES {
            let pair = KeyPair::generate(curve).unwrap();
            assert_eq!(get_public_key(&pair.secret).unwrap(), pair.public);

            let message = b"sealed pre-payload bytes";
            let envelope = encrypt(message, &pair.public).unwrap();
            assert_eq!(envelope.len(), message.len() + ENVELOPE_OVERHEAD);
            assert_eq!(decrypt(&pair.secret, &envelope).unwrap(), message);
        }
    }

    #[test]
    fn test_wrong_key_is_decryption_failed() {
        for curve in CURVES {
            let intended = KeyPair::generate(curve).unwrap();
            let other = KeyPair::generate(curve).unwrap();

            let envelope = encrypt(b"not for you", &intended.public).unwrap();
            assert!(matches!(decrypt(&other.secret, &envelope), Err(VaultError::DecryptionFailed)));
        }
    }

    #[test]
    fn test_cross_curve_key_is_decryption_failed() {
        let ed = KeyPair::generate(CurveType::Ed25519).unwrap();
        let k1 = KeyPair::generate(CurveType::Secp256k1).unwrap();

        let envelope = encrypt(b"curve mismatch", &ed.public).unwrap();
        assert!(matches!(decrypt(&k1.secret, &envelope), Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_envelope_is_decryption_failed() {
        let pair = KeyPair::generate(CurveType::Ed25519).unwrap();
        let mut envelope = encrypt(b"integrity", &pair.public).unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0x01;
        assert!(matches!(decrypt(&pair.secret, &envelope), Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_truncated_envelope_is_decryption_failed() {
        let pair = KeyPair::generate(CurveType::Sr25519).unwrap();
        assert!(matches!(decrypt(&pair.secret, &[0u8; 10]), Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_empty_message() {
        let pair = KeyPair::generate(CurveType::Secp256k1).unwrap();
        let envelope = encrypt(&[], &pair.public).unwrap();
        assert_eq!(envelope.len(), ENVELOPE_OVERHEAD);
        assert!(decrypt(&pair.secret, &envelope).unwrap().is_empty());
    }
}
