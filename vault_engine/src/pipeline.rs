//! Chunk pipeline: read → hash chain → DEFLATE → AES-256-GCM → store, and the reverse.
//!
//! Upload overlaps preparing chunk `i + 1` with storing chunk `i` through a bounded channel;
//! download overlaps fetching chunk `i + 1` with opening chunk `i`. Records are committed and
//! hashes chained strictly in chunk order on both paths.

use crate::config::{MAX_CHUNK_SIZE, VaultConfig};
use crate::crypto::hash::{HASH_LEN, HashChain, HashProvider};
use crate::crypto::symmetric::SymmetricKey;
use crate::error::{Result, VaultError};
use crate::metadata::chunks::{ChunkRecord, Chunks, parse_cid_list};
use crate::metadata::{PreSealed, Sealed};
use crate::schema::EncryptionSchema;
use crate::seal::Seal;
use crate::types::{Cancellation, Cid};
use crate::vault::backend::ByteStore;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Transient state of one upstream: the hash chain, committed chunks, and the sealing key.
/// Consumed by [`Metadata::seal`] once every chunk is stored.
pub struct Metadata<'a> {
    seal: &'a Seal,
    hash_chain: HashChain,
    chunks: Chunks,
    sealing_key: SymmetricKey,
}

impl<'a> Metadata<'a> {
    /// Start an upstream with a freshly generated sealing key.
    pub fn new(seal: &'a Seal) -> Self {
        Self::with_key(seal, SymmetricKey::generate())
    }

    pub fn with_key(seal: &'a Seal, sealing_key: SymmetricKey) -> Self {
        Self {
            seal,
            hash_chain: HashChain::new(),
            chunks: Chunks::new(),
            sealing_key,
        }
    }

    pub fn chunks(&self) -> &Chunks {
        &self.chunks
    }

    pub fn hash(&self) -> Option<[u8; HASH_LEN]> {
        self.hash_chain.current()
    }

    pub fn sealing_key(&self) -> &SymmetricKey {
        &self.sealing_key
    }

    /// The record that gets sealed. Requires at least one chunk in the chain.
    pub fn pre_seal(&self, chunk_cid: &Cid) -> Result<PreSealed> {
        let hash = self
            .hash_chain
            .current()
            .ok_or_else(|| VaultError::ChunkOrder("no chunk has been processed".into()))?;

        Ok(PreSealed {
            chunk_cid: chunk_cid.as_str().to_string(),
            hash,
            sealing_key: self.sealing_key.clone(),
            version: self.seal.version(),
        })
    }

    pub fn seal(self, chunk_cid: &Cid, schema: &EncryptionSchema) -> Result<Sealed> {
        let pre_sealed = self.pre_seal(chunk_cid)?;
        let payload = Zeroizing::new(pre_sealed.serialize()?);
        self.seal.seal(&payload, schema)
    }
}

struct PreparedChunk {
    chunk_id: u32,
    raw_size: u32,
    ciphertext: Vec<u8>,
}

/// Push every chunk of `reader` into `store`, then store the encrypted chunk-id list.
///
/// Returns the content id of the list. An empty stream is stored as a single empty chunk.
pub fn upload_chunks<R: Read>(
    reader: R,
    metadata: &mut Metadata<'_>,
    store: &dyn ByteStore,
    hasher: &dyn HashProvider,
    config: &VaultConfig,
    cancellation: &Cancellation,
) -> Result<Cid> {
    let (tx, rx) = sync_channel::<PreparedChunk>(config.pipeline_depth.max(1));
    let chunks = &mut metadata.chunks;
    let chain = &mut metadata.hash_chain;
    let key = &metadata.sealing_key;

    thread::scope(|scope| {
        let uploader = scope.spawn(move || store_chunks(rx, chunks, store, cancellation));
        let produced = produce_chunks(reader, chain, key, hasher, config, cancellation, tx);
        let uploaded = uploader
            .join()
            .map_err(|_| VaultError::Store("chunk uploader panicked".into()))?;
        uploaded.and(produced)
    })?;

    cancellation.check()?;
    let list = metadata.sealing_key.encrypt(&metadata.chunks.serialize_cids())?;
    let receipt = store.add(&list).map_err(|e| VaultError::Store(e.to_string()))?;
    let list_cid = Cid::parse(&receipt.id)?;

    info!(chunks = metadata.chunks.len(), bytes = metadata.chunks.total_raw_size(), "chunks uploaded");
    Ok(list_cid)
}

fn produce_chunks<R: Read>(
    mut reader: R,
    chain: &mut HashChain,
    key: &SymmetricKey,
    hasher: &dyn HashProvider,
    config: &VaultConfig,
    cancellation: &Cancellation,
    tx: SyncSender<PreparedChunk>,
) -> Result<()> {
    let level = Compression::new(config.compression_level);
    let mut chunk_id = 0u32;

    loop {
        cancellation.check()?;

        let chunk = read_chunk(&mut reader, config.chunk_size)?;
        if chunk.is_empty() && chunk_id > 0 {
            break;
        }
        let is_last = chunk.len() < config.chunk_size;

        chain.append(hasher, &chunk);
        let ciphertext = key.encrypt(&deflate(&chunk, level)?)?;
        let raw_size = u32::try_from(chunk.len())
            .map_err(|_| VaultError::ChunkOrder("chunk larger than 4 GiB".into()))?;

        let prepared = PreparedChunk {
            chunk_id,
            raw_size,
            ciphertext,
        };
        if tx.send(prepared).is_err() {
            // the uploader stopped and reports why
            break;
        }

        if is_last {
            break;
        }
        chunk_id = chunk_id
            .checked_add(1)
            .ok_or_else(|| VaultError::ChunkOrder("chunk id space exhausted".into()))?;
    }
    Ok(())
}

fn store_chunks(
    rx: Receiver<PreparedChunk>,
    chunks: &mut Chunks,
    store: &dyn ByteStore,
    cancellation: &Cancellation,
) -> Result<()> {
    for prepared in rx {
        cancellation.check()?;

        let receipt = store
            .add(&prepared.ciphertext)
            .map_err(|e| VaultError::Store(e.to_string()))?;
        // ciphertext length, not the size the store reports
        let ciphertext_size = u32::try_from(prepared.ciphertext.len())
            .map_err(|_| VaultError::ChunkOrder("encrypted chunk larger than 4 GiB".into()))?;

        chunks.insert(ChunkRecord {
            chunk_id: prepared.chunk_id,
            raw_chunk_size: prepared.raw_size,
            ipfs_chunk_size: ciphertext_size,
            ipfs_cid: Cid::parse(&receipt.id)?,
        })?;

        debug!(
            chunk_id = prepared.chunk_id,
            raw_size = prepared.raw_size,
            encrypted_size = ciphertext_size,
            reported_size = receipt.size,
            cid = %receipt.id,
            "chunk stored"
        );
    }
    Ok(())
}

/// Fetch, open and verify every chunk behind `pre_sealed`, writing plaintext to `writer`.
///
/// Bytes are streamed as they verify per chunk, but the operation only succeeds once the final
/// chain value equals `pre_sealed.hash`. Any earlier output must be discarded on error.
pub fn download_chunks<W: Write>(
    pre_sealed: &PreSealed,
    store: &dyn ByteStore,
    hasher: &dyn HashProvider,
    writer: W,
    config: &VaultConfig,
    cancellation: &Cancellation,
) -> Result<u64> {
    cancellation.check()?;

    let list_blob = store
        .cat(&pre_sealed.chunk_cid)
        .map_err(|e| VaultError::Store(e.to_string()))?;
    let list = pre_sealed
        .sealing_key
        .decrypt(&list_blob)
        .map_err(|_| VaultError::IntegrityMismatch("chunk list does not open under the sealing key".into()))?;
    let cids = parse_cid_list(&list)?;
    if cids.is_empty() {
        return Err(VaultError::IntegrityMismatch("chunk list is empty".into()));
    }
    let expected_chunks = cids.len();

    let (tx, rx) = sync_channel::<(usize, Vec<u8>)>(config.pipeline_depth.max(1));
    let mut chain = HashChain::new();

    let written = thread::scope(|scope| {
        let fetcher = scope.spawn(move || fetch_chunks(cids, store, cancellation, tx));
        let consumed = open_chunks(rx, &pre_sealed.sealing_key, &mut chain, hasher, writer, cancellation);
        let fetched = fetcher
            .join()
            .map_err(|_| VaultError::Store("chunk fetcher panicked".into()))?;
        fetched?;
        consumed
    })?;

    if chain.len() as usize != expected_chunks {
        return Err(VaultError::IntegrityMismatch(format!(
            "recovered {} of {expected_chunks} chunks",
            chain.len()
        )));
    }
    if chain.current() != Some(pre_sealed.hash) {
        return Err(VaultError::IntegrityMismatch("hash chain does not match the sealed hash".into()));
    }

    info!(chunks = expected_chunks, bytes = written, "chunks verified");
    Ok(written)
}

fn fetch_chunks(
    cids: Vec<Cid>,
    store: &dyn ByteStore,
    cancellation: &Cancellation,
    tx: SyncSender<(usize, Vec<u8>)>,
) -> Result<()> {
    for (index, cid) in cids.iter().enumerate() {
        cancellation.check()?;
        let blob = store.cat(cid.as_str()).map_err(|e| VaultError::Store(e.to_string()))?;
        if tx.send((index, blob)).is_err() {
            break;
        }
    }
    Ok(())
}

fn open_chunks<W: Write>(
    rx: Receiver<(usize, Vec<u8>)>,
    key: &SymmetricKey,
    chain: &mut HashChain,
    hasher: &dyn HashProvider,
    mut writer: W,
    cancellation: &Cancellation,
) -> Result<u64> {
    let mut written = 0u64;

    for (expected, (index, blob)) in rx.into_iter().enumerate() {
        cancellation.check()?;
        if index != expected {
            return Err(VaultError::ChunkOrder(format!("chunk {index} arrived in place of {expected}")));
        }

        let deflated = key
            .decrypt(&blob)
            .map_err(|_| VaultError::IntegrityMismatch(format!("chunk {index} failed authentication")))?;
        let chunk = inflate(&deflated)
            .map_err(|_| VaultError::IntegrityMismatch(format!("chunk {index} does not inflate")))?;

        chain.append(hasher, &chunk);
        writer.write_all(&chunk)?;
        written += chunk.len() as u64;

        debug!(chunk_id = index, raw_size = chunk.len(), "chunk opened");
    }

    writer.flush()?;
    Ok(written)
}

/// Fill up to `chunk_size` bytes; a short result means the stream ended.
fn read_chunk<R: Read>(reader: &mut R, chunk_size: usize) -> Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(chunk_size.min(MAX_CHUNK_SIZE));
    reader.take(chunk_size as u64).read_to_end(&mut chunk)?;
    Ok(chunk)
}

pub fn deflate(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2 + 16), level);
    encoder
        .write_all(data)
        .map_err(|e| VaultError::Compression(e.to_string()))?;
    encoder.finish().map_err(|e| VaultError::Compression(e.to_string()))
}

/// Inflate one chunk, refusing output beyond [`MAX_CHUNK_SIZE`].
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_CHUNK_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| VaultError::Compression(e.to_string()))?;

    if out.len() > MAX_CHUNK_SIZE {
        return Err(VaultError::Compression("chunk inflates past the maximum chunk size".into()));
    }
    Ok(out)
}
