//! Who may recover a sealed secret, and under what threshold.

use crate::crypto::keys::PublicKey;
use crate::error::{Result, VaultError};
use crate::seal::tss::MAX_SHARES;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declarative recipient policy.
///
/// `members` is ordered and may repeat a key; a key listed `w` times holds `w` independent shares.
/// Once a schema is bound to stored ciphertext it is never mutated; re-keying seals under a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSchema {
    pub author: PublicKey,
    pub num_of_shares: u32,
    pub threshold: u32,
    pub unencrypted_piece_count: u32,
    pub members: Vec<PublicKey>,
    pub is_public: bool,
}

impl EncryptionSchema {
    pub fn new(author: PublicKey, num_of_shares: u32, threshold: u32, unencrypted_piece_count: u32) -> Self {
        Self {
            author,
            num_of_shares,
            threshold,
            unencrypted_piece_count,
            members: Vec::new(),
            is_public: false,
        }
    }

    /// A schema whose bundle anyone can read: the payload is stored without sharing or encryption.
    pub fn public(author: PublicKey) -> Self {
        Self {
            author,
            num_of_shares: 1,
            threshold: 1,
            unencrypted_piece_count: 1,
            members: Vec::new(),
            is_public: true,
        }
    }

    /// Push `public_key` onto the member list `weight` times.
    pub fn add_member(&mut self, public_key: PublicKey, weight: u32) {
        for _ in 0..weight {
            self.members.push(public_key);
        }
    }

    /// Count of distinct member keys. Informational only, recovery never uses it.
    pub fn get_num_of_participants(&self) -> usize {
        self.members.iter().collect::<HashSet<_>>().len()
    }

    pub fn verify(&self) -> bool {
        self.validate().is_ok()
    }

    /// Like [`verify`](Self::verify) but reports which invariant failed.
    pub fn validate(&self) -> Result<()> {
        let listed = self.unencrypted_piece_count as u64 + self.members.len() as u64;
        if self.num_of_shares as u64 != listed {
            return Err(VaultError::SchemaInvalid(format!(
                "num_of_shares is {} but {} unencrypted pieces plus {} member entries were given",
                self.num_of_shares,
                self.unencrypted_piece_count,
                self.members.len()
            )));
        }

        if self.threshold > self.num_of_shares {
            return Err(VaultError::SchemaInvalid(format!(
                "threshold {} exceeds num_of_shares {}",
                self.threshold, self.num_of_shares
            )));
        }

        if !self.is_public {
            if self.threshold == 0 {
                return Err(VaultError::SchemaInvalid("threshold must be at least 1".into()));
            }
            if self.num_of_shares > MAX_SHARES {
                return Err(VaultError::SchemaInvalid(format!(
                    "num_of_shares {} exceeds the maximum of {MAX_SHARES}",
                    self.num_of_shares
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{CurveType, KeyPair};

    fn key(curve: CurveType) -> PublicKey {
        KeyPair::generate(curve).unwrap().public
    }

    #[test]
    fn test_weighted_schema_verifies() {
        let author = key(CurveType::Ed25519);
        let mut schema = EncryptionSchema::new(author, 5, 3, 1);
        schema.add_member(author, 2);
        schema.add_member(key(CurveType::Sr25519), 1);
        schema.add_member(key(CurveType::Secp256k1), 1);

        assert!(schema.verify());
        assert_eq!(schema.members.len(), 4);
        assert_eq!(schema.get_num_of_participants(), 3);
    }

    #[test]
    fn test_share_count_mismatch_is_invalid() {
        let author = key(CurveType::Ed25519);
        let mut schema = EncryptionSchema::new(author, 4, 2, 1);
        schema.add_member(author, 1);

        assert!(!schema.verify());
        assert!(matches!(schema.validate(), Err(VaultError::SchemaInvalid(_))));
    }

    #[test]
    fn test_threshold_above_shares_is_invalid() {
        let author = key(CurveType::Ed25519);
        let mut schema = EncryptionSchema::new(author, 2, 3, 0);
        schema.add_member(author, 2);
        assert!(!schema.verify());
    }

    #[test]
    fn test_zero_threshold_private_is_invalid() {
        let author = key(CurveType::Ed25519);
        let mut schema = EncryptionSchema::new(author, 1, 0, 0);
        schema.add_member(author, 1);
        assert!(!schema.verify());
    }

    #[test]
    fn test_too_many_shares_is_invalid() {
        let author = key(CurveType::Ed25519);
        let schema = EncryptionSchema::new(author, 256, 2, 256);
        assert!(!schema.verify());
    }

    #[test]
    fn test_share_limit_matches_sharing() {
        let author = key(CurveType::Ed25519);
        let widest = EncryptionSchema::new(author, MAX_SHARES, 2, MAX_SHARES);
        assert!(widest.verify());
        assert!(crate::seal::tss::generate_shares(b"x", widest.num_of_shares, widest.threshold).is_ok());

        let over = EncryptionSchema::new(author, MAX_SHARES + 1, 2, MAX_SHARES + 1);
        assert!(matches!(over.validate(), Err(VaultError::SchemaInvalid(_))));
    }

    #[test]
    fn test_public_schema_verifies() {
        let schema = EncryptionSchema::public(key(CurveType::Ed25519));
        assert!(schema.verify());
        assert!(schema.is_public);
    }

    #[test]
    fn test_schema_serde_round_trip() {
        let author = key(CurveType::Secp256k1);
        let mut schema = EncryptionSchema::new(author, 2, 2, 1);
        schema.add_member(author, 1);

        let json = serde_json::to_string(&schema).unwrap();
        let back: EncryptionSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
