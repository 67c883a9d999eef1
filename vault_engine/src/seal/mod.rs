//! Sealing: threshold-share a payload, then gate each share behind one member key.
//!
//! A private bundle is a [`CombinedCipher`] whose slices are all the same width. The first
//! `unencrypted_piece_count` slices are clear envelopes (zero ephemeral key, zero nonce, the raw
//! share, zero tag) readable by anyone holding the bundle. Every further slice is the next share
//! encrypted to the next entry of the member list.

pub mod cipher;
pub mod tss;

use crate::crypto::asymmetric::{ENVELOPE_OVERHEAD, EPHEMERAL_KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::crypto::keys::{PublicKey, SecretKey};
use crate::error::{Result, VaultError};
use crate::metadata::Sealed;
use crate::schema::EncryptionSchema;
use crate::types::Version;
use std::collections::BTreeMap;
use tracing::debug;
use zeroize::Zeroizing;

pub use cipher::CombinedCipher;

const CLEAR_HEADER_LEN: usize = EPHEMERAL_KEY_LEN + NONCE_LEN;

/// An unlocked keyring. Built from secret keys up front, never unlocked after construction.
#[derive(Debug, Clone, Default)]
pub struct Sealer {
    keys: Vec<SecretKey>,
}

impl Sealer {
    pub fn unlock(key: SecretKey) -> Self {
        Self { keys: vec![key] }
    }

    pub fn with_keys(keys: Vec<SecretKey>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[SecretKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn public_keys(&self) -> Result<Vec<PublicKey>> {
        self.keys.iter().map(SecretKey::public_key).collect()
    }

    /// Decrypt-by-trial of one slice against every held key.
    pub fn try_open(&self, slice: &[u8]) -> Option<Vec<u8>> {
        cipher::open_slice(slice, &self.keys)
    }
}

/// Seals and recovers payloads for one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Seal {
    version: Version,
}

impl Seal {
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Seal `message` under `schema`. Refuses to run on a schema that fails verification.
    pub fn seal(&self, message: &[u8], schema: &EncryptionSchema) -> Result<Sealed> {
        schema.validate()?;

        if schema.is_public {
            return Ok(Sealed::public(message.to_vec(), self.version));
        }

        let shares: Vec<Zeroizing<Vec<u8>>> =
            tss::generate_shares(message, schema.num_of_shares, schema.threshold)?
                .into_iter()
                .map(Zeroizing::new)
                .collect();
        let (clear, private) = shares.split_at(schema.unencrypted_piece_count as usize);

        let slice_len = tss::share_len(message.len()) + ENVELOPE_OVERHEAD;
        let mut cipher = CombinedCipher::with_slice_len(
            u32::try_from(slice_len).map_err(|_| VaultError::Crypto("payload too large to seal".into()))?,
        );

        for share in clear {
            cipher.push_slice(&clear_envelope(share))?;
        }
        for (share, member) in private.iter().zip(&schema.members) {
            let envelope = CombinedCipher::build(share, std::slice::from_ref(member))?;
            cipher.push_slice(&envelope.bytes)?;
        }

        debug!(
            shares = schema.num_of_shares,
            threshold = schema.threshold,
            clear_pieces = schema.unencrypted_piece_count,
            participants = schema.get_num_of_participants(),
            "payload sealed"
        );
        Ok(Sealed::private(cipher, self.version))
    }

    /// Collect every share the bundle yields to `sealer`, then reconstruct.
    ///
    /// No readable share at all is [`VaultError::DecryptionFailed`]; too few shares is
    /// [`VaultError::ThresholdNotMet`].
    pub fn recover(&self, sealed: &Sealed, sealer: &Sealer) -> Result<Vec<u8>> {
        if sealed.version != self.version {
            return Err(VaultError::WireFormat(format!(
                "bundle version {} does not match {}",
                sealed.version, self.version
            )));
        }

        if sealed.is_public {
            return Ok(sealed.cipher.bytes.clone());
        }
        sealed.cipher.check_layout()?;

        let mut shares: Vec<(usize, Zeroizing<Vec<u8>>)> = Vec::new();
        let mut clear_pieces = 0usize;
        for (position, slice) in sealed.cipher.slices().enumerate() {
            if let Some(share) = open_clear_envelope(slice) {
                clear_pieces += 1;
                shares.push((position, Zeroizing::new(share.to_vec())));
            } else if let Some(share) = sealer.try_open(slice) {
                shares.push((position, Zeroizing::new(share)));
            }
        }

        debug!(
            slices = sealed.cipher.slice_count(),
            clear_pieces,
            opened = shares.len() - clear_pieces,
            "collected shares"
        );

        if shares.is_empty() {
            return Err(VaultError::DecryptionFailed);
        }

        let all: Vec<&[u8]> = shares.iter().map(|(_, share)| share.as_slice()).collect();
        let failure = match tss::recover(&all) {
            Ok(message) => return Ok(message),
            Err(e) => e,
        };

        // A combined bundle holds several sealings end to end. Within one sealing the share at
        // slice offset i has x = i + 1, so position + 1 - x names the sealing it came from.
        let mut sealings: BTreeMap<usize, Vec<&[u8]>> = BTreeMap::new();
        for (position, share) in &shares {
            if let Some(start) = share.first().and_then(|x| (position + 1).checked_sub(*x as usize)) {
                sealings.entry(start).or_default().push(share.as_slice());
            }
        }
        if sealings.len() < 2 {
            return Err(failure);
        }

        sealings
            .values()
            .find_map(|group| tss::recover(group).ok())
            .ok_or(failure)
    }
}

fn clear_envelope(share: &[u8]) -> Vec<u8> {
    let mut slice = vec![0u8; CLEAR_HEADER_LEN];
    slice.extend_from_slice(share);
    slice.extend_from_slice(&[0u8; TAG_LEN]);
    slice
}

fn open_clear_envelope(slice: &[u8]) -> Option<&[u8]> {
    if slice.len() < CLEAR_HEADER_LEN + TAG_LEN {
        return None;
    }
    let (header, rest) = slice.split_at(CLEAR_HEADER_LEN);
    let (share, tag) = rest.split_at(rest.len() - TAG_LEN);

    let is_clear = header.iter().all(|b| *b == 0) && tag.iter().all(|b| *b == 0);
    is_clear.then_some(share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{CurveType, KeyPair};

    #[test]
    fn test_public_schema_stores_message_verbatim() {
        let author = KeyPair::generate(CurveType::Ed25519).unwrap();
        let seal = Seal::default();

        let sealed = seal.seal(b"open record", &EncryptionSchema::public(author.public)).unwrap();
        assert!(sealed.is_public);
        assert_eq!(sealed.cipher.per_recipient_length, 0);
        assert_eq!(seal.recover(&sealed, &Sealer::default()).unwrap(), b"open record");
    }

    #[test]
    fn test_invalid_schema_is_refused() {
        let author = KeyPair::generate(CurveType::Ed25519).unwrap();
        let schema = EncryptionSchema::new(author.public, 3, 2, 0);
        assert!(matches!(
            Seal::default().seal(b"payload", &schema),
            Err(VaultError::SchemaInvalid(_))
        ));
    }

    #[test]
    fn test_slices_are_uniform_with_clear_pieces() {
        let author = KeyPair::generate(CurveType::Secp256k1).unwrap();
        let mut schema = EncryptionSchema::new(author.public, 3, 2, 1);
        schema.add_member(author.public, 2);

        let sealed = Seal::default().seal(&[7u8; 114], &schema).unwrap();
        assert_eq!(sealed.cipher.per_recipient_length as usize, tss::share_len(114) + ENVELOPE_OVERHEAD);
        assert_eq!(sealed.cipher.slice_count(), 3);

        let first = sealed.cipher.slices().next().unwrap();
        assert!(open_clear_envelope(first).is_some());
    }

    #[test]
    fn test_author_recovers_and_outsider_cannot() {
        let author = KeyPair::generate(CurveType::Sr25519).unwrap();
        let outsider = KeyPair::generate(CurveType::Sr25519).unwrap();
        let mut schema = EncryptionSchema::new(author.public, 2, 2, 0);
        schema.add_member(author.public, 2);

        let seal = Seal::default();
        let sealed = seal.seal(b"secret", &schema).unwrap();

        assert_eq!(seal.recover(&sealed, &Sealer::unlock(author.secret)).unwrap(), b"secret");
        assert!(matches!(
            seal.recover(&sealed, &Sealer::unlock(outsider.secret)),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let author = KeyPair::generate(CurveType::Ed25519).unwrap();
        let sealed = Seal::default().seal(b"v1", &EncryptionSchema::public(author.public)).unwrap();

        let other = Seal::new(Version([0, 0, 0, 2]));
        assert!(matches!(
            other.recover(&sealed, &Sealer::default()),
            Err(VaultError::WireFormat(_))
        ));
    }

    #[test]
    fn test_sealer_public_keys() {
        let a = KeyPair::generate(CurveType::Ed25519).unwrap();
        let b = KeyPair::generate(CurveType::Secp256k1).unwrap();
        let sealer = Sealer::with_keys(vec![a.secret.clone(), b.secret.clone()]);
        assert_eq!(sealer.public_keys().unwrap(), vec![a.public, b.public]);
        assert_eq!(sealer.keys().len(), 2);
    }
}
