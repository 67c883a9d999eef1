//! Hashing capability injected into the chunk pipeline, and the running hash chain.

use sha2::{Digest, Sha256};

pub const HASH_LEN: usize = 32;

/// Digest provider for chunk hashing. Swappable so hosts can route hashing to their own backend.
pub trait HashProvider: Send + Sync {
    fn hash(&self, data: &[u8]) -> [u8; HASH_LEN];

    /// Digest of `a ‖ b` without materializing the concatenation where the backend allows it.
    fn hash_pair(&self, a: &[u8], b: &[u8]) -> [u8; HASH_LEN] {
        let mut joined = Vec::with_capacity(a.len() + b.len());
        joined.extend_from_slice(a);
        joined.extend_from_slice(b);
        self.hash(&joined)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl HashProvider for Sha256Hasher {
    fn hash(&self, data: &[u8]) -> [u8; HASH_LEN] {
        Sha256::digest(data).into()
    }

    fn hash_pair(&self, a: &[u8], b: &[u8]) -> [u8; HASH_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(a);
        hasher.update(b);
        hasher.finalize().into()
    }
}

/// `h0 = H(c0)`, `hi = H(h(i-1) ‖ ci)`. Strictly sequential.
#[derive(Debug, Clone, Default)]
pub struct HashChain {
    current: Option<[u8; HASH_LEN]>,
    length: u32,
}

impl HashChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, hasher: &dyn HashProvider, chunk: &[u8]) -> [u8; HASH_LEN] {
        let next = match &self.current {
            None => hasher.hash(chunk),
            Some(previous) => hasher.hash_pair(previous, chunk),
        };
        self.current = Some(next);
        self.length += 1;
        next
    }

    /// Final chain value, `None` before the first chunk.
    pub fn current(&self) -> Option<[u8; HASH_LEN]> {
        self.current
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}
