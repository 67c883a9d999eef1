//! Curve-tagged key material.
//!
//! Every key carries its curve so a single recipient set can mix curves:
//!
//! - **Ed25519**: the curve25519 box key (x25519 agreement). This is the default.
//! - **Sr25519**: Ristretto255 keys in the 64-byte sr25519 secret layout (scalar ‖ nonce).
//! - **Secp256k1**: SEC1 keys, public keys are 33-byte compressed points.

use crate::error::{Result, VaultError};
use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_POINT, ristretto::CompressedRistretto, scalar::Scalar};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    Ed25519,
    Sr25519,
    Secp256k1,
}

impl CurveType {
    /// Fixed public key length callers must validate against.
    pub const fn public_key_len(&self) -> usize {
        match self {
            CurveType::Ed25519 | CurveType::Sr25519 => 32,
            CurveType::Secp256k1 => 33,
        }
    }

    pub const fn secret_key_len(&self) -> usize {
        match self {
            CurveType::Ed25519 | CurveType::Secp256k1 => 32,
            CurveType::Sr25519 => 64,
        }
    }
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CurveType::Ed25519 => "ed25519",
            CurveType::Sr25519 => "sr25519",
            CurveType::Secp256k1 => "secp256k1",
        };
        f.write_str(name)
    }
}

/// A recipient public key, tagged with its curve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyRepr", into = "PublicKeyRepr")]
pub enum PublicKey {
    Ed25519([u8; 32]),
    Sr25519([u8; 32]),
    Secp256k1([u8; 33]),
}

impl PublicKey {
    /// Parse key bytes for `curve`, rejecting wrong lengths and points off the curve.
    pub fn from_bytes(curve: CurveType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != curve.public_key_len() {
            return Err(VaultError::InvalidKey(format!(
                "{curve} public key must be {} bytes, got {}",
                curve.public_key_len(),
                bytes.len()
            )));
        }

        match curve {
            CurveType::Ed25519 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(bytes);
                Ok(PublicKey::Ed25519(key))
            }
            CurveType::Sr25519 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(bytes);
                CompressedRistretto(key)
                    .decompress()
                    .ok_or_else(|| VaultError::InvalidKey("sr25519 public key is not a ristretto point".into()))?;
                Ok(PublicKey::Sr25519(key))
            }
            CurveType::Secp256k1 => {
                k256::PublicKey::from_sec1_bytes(bytes)
                    .map_err(|_| VaultError::InvalidKey("secp256k1 public key is not on the curve".into()))?;
                let mut key = [0u8; 33];
                key.copy_from_slice(bytes);
                Ok(PublicKey::Secp256k1(key))
            }
        }
    }

    pub fn curve(&self) -> CurveType {
        match self {
            PublicKey::Ed25519(_) => CurveType::Ed25519,
            PublicKey::Sr25519(_) => CurveType::Sr25519,
            PublicKey::Secp256k1(_) => CurveType::Secp256k1,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PublicKey::Ed25519(key) | PublicKey::Sr25519(key) => &key[..],
            PublicKey::Secp256k1(key) => &key[..],
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}:{})", self.curve(), hex::encode(self.as_bytes()))
    }
}

#[derive(Serialize, Deserialize)]
struct PublicKeyRepr {
    curve: CurveType,
    key: String,
}

impl TryFrom<PublicKeyRepr> for PublicKey {
    type Error = VaultError;

    fn try_from(repr: PublicKeyRepr) -> Result<Self> {
        let bytes = hex::decode(&repr.key).map_err(|e| VaultError::InvalidKey(format!("bad hex: {e}")))?;
        PublicKey::from_bytes(repr.curve, &bytes)
    }
}

impl From<PublicKey> for PublicKeyRepr {
    fn from(key: PublicKey) -> Self {
        Self {
            curve: key.curve(),
            key: hex::encode(key.as_bytes()),
        }
    }
}

/// Secret key material, zeroized on drop and redacted from `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum SecretKey {
    Ed25519([u8; 32]),
    Sr25519([u8; 64]),
    Secp256k1([u8; 32]),
}

impl SecretKey {
    /// Generate a fresh secret key on `curve` from the OS CSPRNG.
    pub fn generate(curve: CurveType) -> Self {
        match curve {
            CurveType::Ed25519 => {
                let mut key = [0u8; 32];
                OsRng.fill_bytes(&mut key);
                SecretKey::Ed25519(key)
            }
            CurveType::Sr25519 => {
                let mut wide = [0u8; 64];
                OsRng.fill_bytes(&mut wide);
                let scalar = Scalar::from_bytes_mod_order_wide(&wide);
                wide.zeroize();

                let mut key = [0u8; 64];
                key[..32].copy_from_slice(scalar.as_bytes());
                OsRng.fill_bytes(&mut key[32..]);
                SecretKey::Sr25519(key)
            }
            CurveType::Secp256k1 => {
                let secret = k256::SecretKey::random(&mut OsRng);
                let mut key = [0u8; 32];
                key.copy_from_slice(&secret.to_bytes());
                SecretKey::Secp256k1(key)
            }
        }
    }

    /// Import secret bytes for `curve`, rejecting malformed scalars.
    pub fn from_bytes(curve: CurveType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != curve.secret_key_len() {
            return Err(VaultError::InvalidKey(format!(
                "{curve} secret key must be {} bytes, got {}",
                curve.secret_key_len(),
                bytes.len()
            )));
        }

        match curve {
            CurveType::Ed25519 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(bytes);
                Ok(SecretKey::Ed25519(key))
            }
            CurveType::Sr25519 => {
                let mut key = [0u8; 64];
                key.copy_from_slice(bytes);
                let secret = SecretKey::Sr25519(key);
                secret.sr25519_scalar()?;
                Ok(secret)
            }
            CurveType::Secp256k1 => {
                k256::SecretKey::from_slice(bytes)
                    .map_err(|_| VaultError::InvalidKey("secp256k1 secret key is out of range".into()))?;
                let mut key = [0u8; 32];
                key.copy_from_slice(bytes);
                Ok(SecretKey::Secp256k1(key))
            }
        }
    }

    pub fn curve(&self) -> CurveType {
        match self {
            SecretKey::Ed25519(_) => CurveType::Ed25519,
            SecretKey::Sr25519(_) => CurveType::Sr25519,
            SecretKey::Secp256k1(_) => CurveType::Secp256k1,
        }
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        match self {
            SecretKey::Ed25519(key) => {
                let secret = x25519_dalek::StaticSecret::from(*key);
                let public = x25519_dalek::PublicKey::from(&secret);
                Ok(PublicKey::Ed25519(public.to_bytes()))
            }
            SecretKey::Sr25519(_) => {
                let scalar = self.sr25519_scalar()?;
                let point = RISTRETTO_BASEPOINT_POINT * scalar;
                Ok(PublicKey::Sr25519(point.compress().to_bytes()))
            }
            SecretKey::Secp256k1(key) => {
                let secret = k256::SecretKey::from_slice(key)
                    .map_err(|_| VaultError::InvalidKey("secp256k1 secret key is out of range".into()))?;
                let encoded = secret.public_key().to_encoded_point(true);
                PublicKey::from_bytes(CurveType::Secp256k1, encoded.as_bytes())
            }
        }
    }

    pub(crate) fn sr25519_scalar(&self) -> Result<Scalar> {
        match self {
            SecretKey::Sr25519(key) => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&key[..32]);
                let scalar = Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes));
                bytes.zeroize();
                scalar.ok_or_else(|| VaultError::InvalidKey("sr25519 secret scalar is not canonical".into()))
            }
            _ => Err(VaultError::InvalidKey(format!("{} key used as sr25519", self.curve()))),
        }
    }

    #[cfg(test)]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            SecretKey::Ed25519(key) | SecretKey::Secp256k1(key) => &key[..],
            SecretKey::Sr25519(key) => &key[..],
        }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({}:[REDACTED])", self.curve())
    }
}

/// A secret key together with its derived public key.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn generate(curve: CurveType) -> Result<Self> {
        let secret = SecretKey::generate(curve);
        let public = secret.public_key()?;
        Ok(Self { secret, public })
    }

    pub fn from_secret(secret: SecretKey) -> Result<Self> {
        let public = secret.public_key()?;
        Ok(Self { secret, public })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [CurveType; 3] = [CurveType::Ed25519, CurveType::Sr25519, CurveType::Secp256k1];

    #[test]
    fn test_public_key_lengths() {
        for curve in CURVES {
            let pair = KeyPair::generate(curve).unwrap();
            assert_eq!(pair.public.curve(), curve);
            assert_eq!(pair.public.as_bytes().len(), curve.public_key_len());
        }
    }

    #[test]
    fn test_public_key_rejects_wrong_length() {
        assert!(PublicKey::from_bytes(CurveType::Ed25519, &[1u8; 33]).is_err());
        assert!(PublicKey::from_bytes(CurveType::Secp256k1, &[2u8; 32]).is_err());
    }

    #[test]
    fn test_public_key_rejects_invalid_point() {
        // 0x05 is not a valid SEC1 tag
        let mut bytes = [0u8; 33];
        bytes[0] = 0x05;
        assert!(PublicKey::from_bytes(CurveType::Secp256k1, &bytes).is_err());
    }

    #[test]
    fn test_secret_round_trip_keeps_public_key() {
        for curve in CURVES {
            let pair = KeyPair::generate(curve).unwrap();
            let imported = SecretKey::from_bytes(curve, pair.secret.as_bytes()).unwrap();
            assert_eq!(imported.public_key().unwrap(), pair.public);
        }
    }

    #[test]
    fn test_sr25519_rejects_non_canonical_scalar() {
        let bytes = [0xffu8; 64];
        assert!(SecretKey::from_bytes(CurveType::Sr25519, &bytes).is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let key = SecretKey::from_bytes(CurveType::Ed25519, &[7u8; 32]).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("0707"));
    }

    #[test]
    fn test_public_key_serde_round_trip() {
        let pair = KeyPair::generate(CurveType::Secp256k1).unwrap();
        let json = serde_json::to_string(&pair.public).unwrap();
        assert!(json.contains("secp256k1"));

        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair.public);
    }
}
