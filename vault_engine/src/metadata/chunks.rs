//! Ordered chunk table and the chunk-id list blob it produces.

use crate::error::{Result, VaultError};
use crate::types::{CID_LEN, Cid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub chunk_id: u32,
    pub raw_chunk_size: u32,
    pub ipfs_chunk_size: u32,
    pub ipfs_cid: Cid,
}

/// Chunk records keyed by `chunk_id`, which must arrive as 0, 1, 2, ...
#[derive(Debug, Clone, Default)]
pub struct Chunks {
    records: Vec<ChunkRecord>,
}

impl Chunks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the next record. A repeated or skipped id is a chunk-order error.
    pub fn insert(&mut self, record: ChunkRecord) -> Result<()> {
        let expected = self.records.len();
        let id = record.chunk_id as usize;

        if id < expected {
            return Err(VaultError::ChunkOrder(format!("duplicate chunk id {}", record.chunk_id)));
        }
        if id > expected {
            return Err(VaultError::ChunkOrder(format!(
                "chunk id {} arrived before chunk {expected}",
                record.chunk_id
            )));
        }

        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, chunk_id: u32) -> Option<&ChunkRecord> {
        self.records.get(chunk_id as usize)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.records.iter()
    }

    pub fn total_raw_size(&self) -> u64 {
        self.records.iter().map(|r| r.raw_chunk_size as u64).sum()
    }

    /// Concatenated 46-byte ids in chunk order.
    pub fn serialize_cids(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.records.len() * CID_LEN);
        for record in &self.records {
            out.extend_from_slice(record.ipfs_cid.as_bytes());
        }
        out
    }
}

/// Split a chunk-id list blob back into ids.
pub fn parse_cid_list(bytes: &[u8]) -> Result<Vec<Cid>> {
    if bytes.len() % CID_LEN != 0 {
        return Err(VaultError::WireFormat(format!(
            "chunk list of {} bytes is not a multiple of {CID_LEN}",
            bytes.len()
        )));
    }
    bytes.chunks_exact(CID_LEN).map(Cid::from_slice).collect()
}
