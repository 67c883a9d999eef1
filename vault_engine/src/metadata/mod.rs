//! Fixed-layout wire records: the pre-sealed payload and the sealed bundle.
//!
//! ```text
//! PreSealed (114) = chunk_cid (46) ‖ hash (32) ‖ sealing_key (32) ‖ version (4)
//! Sealed          = flag (2) ‖ cipher bytes ‖ version (4)     flag: [0,0] private, [1,1] public
//! ```
//!
//! The slice width of a private bundle is not on the wire. It is recomputed from the pre-sealed
//! size, so the two layouts must change together.

pub mod chunks;

use crate::crypto::asymmetric::ENVELOPE_OVERHEAD;
use crate::crypto::hash::HASH_LEN;
use crate::crypto::symmetric::{self, SymmetricKey};
use crate::error::{Result, VaultError};
use crate::seal::{CombinedCipher, tss};
use crate::types::{CID_LEN, Cid, Version};

pub use chunks::{ChunkRecord, Chunks};

pub const PRESEAL_SIZE: usize = CID_LEN + HASH_LEN + symmetric::KEY_LEN + Version::LEN;

/// Width of one slice in a private bundle: a threshold share of a pre-sealed record in an envelope.
pub const SEALED_SLICE_LEN: usize = tss::share_len(PRESEAL_SIZE) + ENVELOPE_OVERHEAD;

pub const PRIVATE_FLAG: [u8; 2] = [0, 0];
pub const PUBLIC_FLAG: [u8; 2] = [1, 1];
const FLAG_LEN: usize = 2;

/// Everything needed to fetch and verify a vault's content. Only ever exists in the clear
/// inside the process that sealed or recovered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreSealed {
    pub chunk_cid: String,
    pub hash: [u8; HASH_LEN],
    pub sealing_key: SymmetricKey,
    pub version: Version,
}

impl PreSealed {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let cid = Cid::parse(&self.chunk_cid)?;

        let mut out = Vec::with_capacity(PRESEAL_SIZE);
        out.extend_from_slice(cid.as_bytes());
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(self.sealing_key.as_bytes());
        out.extend_from_slice(self.version.as_bytes());
        Ok(out)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRESEAL_SIZE {
            return Err(VaultError::WireFormat(format!(
                "pre-sealed record must be {PRESEAL_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let (cid, rest) = bytes.split_at(CID_LEN);
        let (hash, rest) = rest.split_at(HASH_LEN);
        let (key, version) = rest.split_at(symmetric::KEY_LEN);

        let mut digest = [0u8; HASH_LEN];
        digest.copy_from_slice(hash);

        Ok(Self {
            chunk_cid: Cid::from_slice(cid)?.as_str().to_string(),
            hash: digest,
            sealing_key: SymmetricKey::from_bytes(key)?,
            version: Version::from_slice(version)?,
        })
    }
}

/// A sealed bundle as stored in the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub cipher: CombinedCipher,
    pub is_public: bool,
    pub version: Version,
}

impl Sealed {
    pub fn public(bytes: Vec<u8>, version: Version) -> Self {
        Self {
            cipher: CombinedCipher::public(bytes),
            is_public: true,
            version,
        }
    }

    pub fn private(cipher: CombinedCipher, version: Version) -> Self {
        Self {
            cipher,
            is_public: false,
            version,
        }
    }

    /// Encode the bundle, refusing any cipher the decoder could not reconstruct.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let flag = if self.is_public {
            if self.cipher.per_recipient_length != 0 || self.cipher.bytes.len() != PRESEAL_SIZE {
                return Err(VaultError::WireFormat(
                    "public bundle must hold exactly one plaintext pre-sealed record".into(),
                ));
            }
            PUBLIC_FLAG
        } else {
            if self.cipher.per_recipient_length as usize != SEALED_SLICE_LEN {
                return Err(VaultError::WireFormat(format!(
                    "private bundle slices must be {SEALED_SLICE_LEN} bytes, got {}",
                    self.cipher.per_recipient_length
                )));
            }
            self.cipher.check_layout()?;
            if self.cipher.bytes.is_empty() {
                return Err(VaultError::WireFormat("private bundle has no slices".into()));
            }
            PRIVATE_FLAG
        };

        let mut out = Vec::with_capacity(FLAG_LEN + self.cipher.bytes.len() + Version::LEN);
        out.extend_from_slice(&flag);
        out.extend_from_slice(&self.cipher.bytes);
        out.extend_from_slice(self.version.as_bytes());
        Ok(out)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FLAG_LEN + Version::LEN {
            return Err(VaultError::WireFormat(format!("sealed record too short: {} bytes", bytes.len())));
        }

        let (flag, rest) = bytes.split_at(FLAG_LEN);
        let (body, version) = rest.split_at(rest.len() - Version::LEN);
        let version = Version::from_slice(version)?;

        match [flag[0], flag[1]] {
            PUBLIC_FLAG => {
                if body.len() != PRESEAL_SIZE {
                    return Err(VaultError::WireFormat(format!(
                        "public bundle must carry {PRESEAL_SIZE} bytes, got {}",
                        body.len()
                    )));
                }
                Ok(Self::public(body.to_vec(), version))
            }
            PRIVATE_FLAG => {
                if body.is_empty() || body.len() % SEALED_SLICE_LEN != 0 {
                    return Err(VaultError::WireFormat(format!(
                        "private bundle of {} bytes is not a whole number of {SEALED_SLICE_LEN}-byte slices",
                        body.len()
                    )));
                }
                let cipher = CombinedCipher {
                    bytes: body.to_vec(),
                    per_recipient_length: SEALED_SLICE_LEN as u32,
                };
                Ok(Self::private(cipher, version))
            }
            other => Err(VaultError::WireFormat(format!("unknown mode flag {other:?}"))),
        }
    }
}

/// Union two private bundles sealed for different recipient sets, without re-sealing.
///
/// Both must be private, share a version and a slice width. Recovery treats each original
/// bundle's slices as its own share set.
pub fn combine_sealed_data(a: &Sealed, b: &Sealed) -> Result<Sealed> {
    if a.is_public || b.is_public {
        return Err(VaultError::WireFormat("only private bundles can be combined".into()));
    }
    if a.version != b.version {
        return Err(VaultError::WireFormat(format!(
            "cannot combine versions {} and {}",
            a.version, b.version
        )));
    }
    if a.cipher.per_recipient_length != b.cipher.per_recipient_length {
        return Err(VaultError::WireFormat(format!(
            "cannot combine slice widths {} and {}",
            a.cipher.per_recipient_length, b.cipher.per_recipient_length
        )));
    }
    a.cipher.check_layout()?;
    b.cipher.check_layout()?;

    let mut bytes = Vec::with_capacity(a.cipher.bytes.len() + b.cipher.bytes.len());
    bytes.extend_from_slice(&a.cipher.bytes);
    bytes.extend_from_slice(&b.cipher.bytes);

    Ok(Sealed::private(
        CombinedCipher {
            bytes,
            per_recipient_length: a.cipher.per_recipient_length,
        },
        a.version,
    ))
}
