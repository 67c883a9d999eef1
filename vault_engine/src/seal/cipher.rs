//! Multi-recipient envelope: one asymmetric envelope per recipient, concatenated.
//!
//! Slices carry no recipient label, so opening is decrypt-by-trial across every slice and key.

use crate::crypto::asymmetric::{self, ENVELOPE_OVERHEAD};
use crate::crypto::keys::{PublicKey, SecretKey};
use crate::error::{Result, VaultError};

/// Envelope bytes plus the fixed slice width. A width of `0` means the bytes are plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedCipher {
    pub bytes: Vec<u8>,
    pub per_recipient_length: u32,
}

impl CombinedCipher {
    /// Public-mode cipher: `bytes` are stored as-is.
    pub fn public(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            per_recipient_length: 0,
        }
    }

    /// Empty private-mode cipher that accepts slices of exactly `per_recipient_length` bytes.
    pub fn with_slice_len(per_recipient_length: u32) -> Self {
        Self {
            bytes: Vec::new(),
            per_recipient_length,
        }
    }

    /// Encrypt `bytes` once to each recipient, using the recipient's own curve.
    pub fn build(bytes: &[u8], recipients: &[PublicKey]) -> Result<Self> {
        if recipients.is_empty() {
            return Err(VaultError::Crypto("a cipher needs at least one recipient".into()));
        }

        let slice_len = u32::try_from(bytes.len() + ENVELOPE_OVERHEAD)
            .map_err(|_| VaultError::Crypto("message too large for one envelope".into()))?;

        let mut cipher = Self::with_slice_len(slice_len);
        for recipient in recipients {
            let envelope = asymmetric::encrypt(bytes, recipient)?;
            cipher.push_slice(&envelope)?;
        }
        Ok(cipher)
    }

    pub fn is_public(&self) -> bool {
        self.per_recipient_length == 0
    }

    /// Append one slice, which must match the fixed width.
    pub fn push_slice(&mut self, slice: &[u8]) -> Result<()> {
        if self.is_public() || slice.len() != self.per_recipient_length as usize {
            return Err(VaultError::WireFormat(format!(
                "slice of {} bytes does not fit a cipher of {}-byte slices",
                slice.len(),
                self.per_recipient_length
            )));
        }
        self.bytes.extend_from_slice(slice);
        Ok(())
    }

    /// Fixed-width slices in order. Empty for public mode.
    pub fn slices(&self) -> impl Iterator<Item = &[u8]> {
        let width = (self.per_recipient_length as usize).max(1);
        let bytes: &[u8] = if self.is_public() { &[] } else { &self.bytes };
        bytes.chunks_exact(width)
    }

    pub fn slice_count(&self) -> usize {
        if self.is_public() {
            0
        } else {
            self.bytes.len() / self.per_recipient_length as usize
        }
    }

    /// `bytes` must be a whole number of slices.
    pub fn check_layout(&self) -> Result<()> {
        if !self.is_public() && self.bytes.len() % self.per_recipient_length as usize != 0 {
            return Err(VaultError::WireFormat(format!(
                "{} cipher bytes are not a multiple of the {}-byte slice width",
                self.bytes.len(),
                self.per_recipient_length
            )));
        }
        Ok(())
    }

    /// Return the first slice any of `keys` can open, or the plaintext in public mode.
    pub fn parse_with_keys(&self, keys: &[SecretKey]) -> Result<Vec<u8>> {
        if self.is_public() {
            return Ok(self.bytes.clone());
        }
        self.check_layout()?;

        self.slices()
            .find_map(|slice| open_slice(slice, keys))
            .ok_or(VaultError::DecryptionFailed)
    }
}

/// Try every key against one slice; per-attempt failures are expected and discarded.
pub(crate) fn open_slice(slice: &[u8], keys: &[SecretKey]) -> Option<Vec<u8>> {
    keys.iter().find_map(|key| asymmetric::decrypt(key, slice).ok())
}
