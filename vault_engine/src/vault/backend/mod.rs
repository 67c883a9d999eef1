//! Collaborator interfaces consumed by the vault: a content-addressed byte store and a
//! registry that maps secret ids to the current sealed bundle.
//!
//! Retries and fallbacks across backends belong to implementations. The vault treats any
//! error returned here as terminal for the running operation.

pub mod memory;

use thiserror::Error;

pub use memory::{MemoryRegistry, MemoryStore};

/// Opaque failure reported by a collaborator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of a successful `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReceipt {
    /// 46-character content id.
    pub id: String,
    pub size: u32,
}

/// Content-addressed blob store.
pub trait ByteStore: Send + Sync {
    fn add(&self, bytes: &[u8]) -> Result<StoreReceipt, BackendError>;
    fn cat(&self, id: &str) -> Result<Vec<u8>, BackendError>;
}

/// Durable secret-id registry. Metadata is the content id of the sealed bundle.
pub trait Registry: Send + Sync {
    fn register_secret(&self, metadata: &[u8]) -> Result<u32, BackendError>;
    fn get_metadata(&self, secret_id: u32) -> Result<Vec<u8>, BackendError>;
    fn update_metadata(&self, secret_id: u32, metadata: &[u8]) -> Result<bool, BackendError>;
}
