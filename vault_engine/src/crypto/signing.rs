//! Proof of access: an Ethereum-style signature made with a vault's sealing key.
//!
//! Holding the sealing key is exactly what recovering a vault grants, so a recoverable
//! secp256k1 signature under that key proves decrypt access without disclosing it.

use crate::crypto::symmetric::SymmetricKey;
use crate::error::{Result, VaultError};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

pub const SIGNATURE_LEN: usize = 65;
const ETHEREUM_V_OFFSET: u8 = 27;

/// A signed statement that its creator could recover the vault behind `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfAccess {
    pub message: Vec<u8>,
    /// `r ‖ s ‖ v`, with `v` in Ethereum's 27/28 form.
    pub signature: [u8; SIGNATURE_LEN],
    /// Lowercase `0x`-prefixed address of the sealing key.
    pub address: String,
}

impl ProofOfAccess {
    /// Sign `message` with the sealing key under the EIP-191 personal-message prefix.
    pub fn sign(sealing_key: &SymmetricKey, message: &[u8]) -> Result<Self> {
        let signer = signing_key(sealing_key)?;
        let prehash = eip191_hash(message);

        let (signature, recovery_id) = signer
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| VaultError::Crypto(format!("Signing failed: {e}")))?;

        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + ETHEREUM_V_OFFSET;

        Ok(Self {
            message: message.to_vec(),
            signature: bytes,
            address: ethereum_address(signer.verifying_key()),
        })
    }

    /// Offline check that the signature over `message` recovers to the embedded address.
    /// Malformed signatures verify as `false`.
    pub fn verify(&self) -> bool {
        match recover_address(&eip191_hash(&self.message), &self.signature) {
            Some(recovered) => recovered.eq_ignore_ascii_case(&self.address),
            None => false,
        }
    }

    /// [`verify`](Self::verify), and additionally require the address a verifier already trusts.
    pub fn verify_against(&self, expected_address: &str) -> bool {
        self.address.eq_ignore_ascii_case(expected_address) && self.verify()
    }
}

/// Ethereum address of the signing key derived from `sealing_key`.
pub fn sealing_key_address(sealing_key: &SymmetricKey) -> Result<String> {
    let signer = signing_key(sealing_key)?;
    Ok(ethereum_address(signer.verifying_key()))
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `keccak256("\x19Ethereum Signed Message:\n" ‖ len ‖ message)`
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

fn signing_key(sealing_key: &SymmetricKey) -> Result<SigningKey> {
    SigningKey::from_slice(sealing_key.as_bytes())
        .map_err(|_| VaultError::InvalidKey("sealing key is not a valid secp256k1 scalar".into()))
}

fn ethereum_address(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // skip the 0x04 uncompressed tag
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

fn recover_address(prehash: &[u8; 32], signature: &[u8; SIGNATURE_LEN]) -> Option<String> {
    let v = signature[64];
    let v = if v >= ETHEREUM_V_OFFSET { v - ETHEREUM_V_OFFSET } else { v };
    let recovery_id = RecoveryId::from_byte(v)?;
    let signature = Signature::from_slice(&signature[..64]).ok()?;

    let key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id).ok()?;
    Some(ethereum_address(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = SymmetricKey::generate();
        let proof = ProofOfAccess::sign(&key, b"I can open vault 7").unwrap();

        assert!(proof.verify());
        assert!(proof.address.starts_with("0x"));
        assert_eq!(proof.address.len(), 42);
        assert_eq!(proof.address, sealing_key_address(&key).unwrap());
        assert!(matches!(proof.signature[64], 27 | 28));
    }

    #[test]
    fn test_altered_message_fails() {
        let key = SymmetricKey::generate();
        let mut proof = ProofOfAccess::sign(&key, b"original").unwrap();
        proof.message = b"forged".to_vec();
        assert!(!proof.verify());
    }

    #[test]
    fn test_other_address_fails() {
        let key = SymmetricKey::generate();
        let proof = ProofOfAccess::sign(&key, b"hello").unwrap();
        let other = sealing_key_address(&SymmetricKey::generate()).unwrap();

        assert!(!proof.verify_against(&other));
        assert!(proof.verify_against(&proof.address.to_uppercase()));
    }

    #[test]
    fn test_malformed_signature_is_false() {
        let key = SymmetricKey::generate();
        let mut proof = ProofOfAccess::sign(&key, b"hello").unwrap();
        proof.signature = [0u8; SIGNATURE_LEN];
        assert!(!proof.verify());
    }

    #[test]
    fn test_eip191_hash_known_vector() {
        // ethers hashMessage("Hello World")
        assert_eq!(
            hex::encode(eip191_hash(b"Hello World")),
            "a1de988600a42c4b4ab089b619297c17d53cffae5d5120d82d8a92d0bb3b78f2"
        );
    }
}
