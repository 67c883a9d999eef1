//! In-process store and registry, for tests and local runs.

use crate::vault::backend::{BackendError, ByteStore, Registry, StoreReceipt};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

/// multihash header: sha2-256, 32-byte digest
const SHA256_MULTIHASH: [u8; 2] = [0x12, 0x20];

/// CIDv0 of `bytes`: base58btc of the sha2-256 multihash. Always 46 characters starting with "Qm".
pub fn cid_v0(bytes: &[u8]) -> String {
    let mut multihash = Vec::with_capacity(34);
    multihash.extend_from_slice(&SHA256_MULTIHASH);
    multihash.extend_from_slice(&Sha256::digest(bytes));
    bs58::encode(multihash).into_string()
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteStore for MemoryStore {
    fn add(&self, bytes: &[u8]) -> Result<StoreReceipt, BackendError> {
        let size = u32::try_from(bytes.len()).map_err(|_| BackendError::new("blob exceeds 4 GiB"))?;
        let id = cid_v0(bytes);

        let mut blobs = self.blobs.write().map_err(|_| BackendError::new("Store lock poisoned"))?;
        blobs.insert(id.clone(), bytes.to_vec());
        Ok(StoreReceipt { id, size })
    }

    fn cat(&self, id: &str) -> Result<Vec<u8>, BackendError> {
        let blobs = self.blobs.read().map_err(|_| BackendError::new("Store lock poisoned"))?;
        blobs
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError(format!("content {id} not found")))
    }
}

/// Assigns ids sequentially from 1.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Arc<RwLock<HashMap<u32, Vec<u8>>>>,
    next_id: AtomicU32,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for MemoryRegistry {
    fn register_secret(&self, metadata: &[u8]) -> Result<u32, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut entries = self.entries.write().map_err(|_| BackendError::new("Registry lock poisoned"))?;
        entries.insert(id, metadata.to_vec());
        Ok(id)
    }

    fn get_metadata(&self, secret_id: u32) -> Result<Vec<u8>, BackendError> {
        let entries = self.entries.read().map_err(|_| BackendError::new("Registry lock poisoned"))?;
        entries
            .get(&secret_id)
            .cloned()
            .ok_or_else(|| BackendError(format!("secret {secret_id} not registered")))
    }

    fn update_metadata(&self, secret_id: u32, metadata: &[u8]) -> Result<bool, BackendError> {
        let mut entries = self.entries.write().map_err(|_| BackendError::new("Registry lock poisoned"))?;
        match entries.get_mut(&secret_id) {
            Some(entry) => {
                *entry = metadata.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_v0_shape() {
        for input in [&b""[..], &b"hello"[..], &[0u8; 4096][..]] {
            let id = cid_v0(input);
            assert_eq!(id.len(), 46);
            assert!(id.starts_with("Qm"));
        }
    }

    #[test]
    fn test_cid_v0_known_value() {
        let digest = Sha256::digest(b"vault");
        let mut expected = vec![0x12, 0x20];
        expected.extend_from_slice(&digest);
        assert_eq!(bs58::decode(cid_v0(b"vault")).into_vec().unwrap(), expected);
    }

    #[test]
    fn test_store_add_and_cat() {
        let store = MemoryStore::new();
        let receipt = store.add(b"blob").unwrap();
        assert_eq!(receipt.size, 4);
        assert_eq!(store.cat(&receipt.id).unwrap(), b"blob");
        assert!(store.cat("missing").is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_registry_lifecycle() {
        let registry = MemoryRegistry::new();
        let first = registry.register_secret(b"one").unwrap();
        let second = registry.register_secret(b"two").unwrap();
        assert_eq!((first, second), (1, 2));

        assert!(registry.update_metadata(first, b"uno").unwrap());
        assert_eq!(registry.get_metadata(first).unwrap(), b"uno");
        assert!(!registry.update_metadata(99, b"none").unwrap());
        assert!(registry.get_metadata(99).is_err());
    }
}
