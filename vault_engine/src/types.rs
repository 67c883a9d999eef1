//! Shared data types for the vault engine: protocol version, content ids and cancellation.

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Length of a content id as returned by the store (CIDv0, base58btc).
pub const CID_LEN: usize = 46;

/// Four-byte protocol version carried by both wire records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(pub [u8; 4]);

impl Version {
    pub const LEN: usize = 4;
    pub const CURRENT: Version = Version([0, 0, 0, 1]);

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = bytes
            .try_into()
            .map_err(|_| VaultError::WireFormat(format!("version must be 4 bytes, got {}", bytes.len())))?;
        Ok(Self(bytes))
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Content id of a blob in the store: exactly 46 ASCII bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cid([u8; CID_LEN]);

impl Cid {
    /// Validate a store-issued id.
    pub fn parse(id: &str) -> Result<Self> {
        Self::from_slice(id.as_bytes())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CID_LEN {
            return Err(VaultError::WireFormat(format!(
                "content id must be {CID_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if !bytes.iter().all(|b| b.is_ascii_graphic()) {
            return Err(VaultError::WireFormat("content id must be printable ASCII".into()));
        }

        let mut cid = [0u8; CID_LEN];
        cid.copy_from_slice(bytes);
        Ok(Self(cid))
    }

    pub fn as_bytes(&self) -> &[u8; CID_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // only ASCII is ever admitted by from_slice
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.as_str())
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative cancellation flag, checked between chunks.
///
/// Clones share the same flag, so a caller keeps one clone and hands another to the vault.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called on any clone.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VaultError::Cancelled)
        } else {
            Ok(())
        }
    }
}
