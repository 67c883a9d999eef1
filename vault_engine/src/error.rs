//! Centralized vault engine error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    /// Encryption schema violates its share-count or threshold invariants.
    #[error("Invalid encryption schema: {0}")]
    SchemaInvalid(String),
    /// No slice/key pair opened, or an AEAD tag did not verify. Carries no cause on purpose.
    #[error("Decryption failed")]
    DecryptionFailed,
    /// Recovered shares did not reconstruct the sentinel; more shares or keys are needed.
    #[error("Threshold not met")]
    ThresholdNotMet,
    /// Downstream content did not match the sealed hash chain.
    #[error("Integrity mismatch: {0}")]
    IntegrityMismatch(String),
    /// Duplicate or out-of-sequence chunk id.
    #[error("Chunk order error: {0}")]
    ChunkOrder(String),
    /// A wire record or one of its fields has the wrong length or layout.
    #[error("Wire format error: {0}")]
    WireFormat(String),
    /// Key bytes are malformed for the declared curve.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    /// Content store failure, surfaced as-is.
    #[error("Store error: {0}")]
    Store(String),
    /// Registry failure, surfaced as-is.
    #[error("Registry error: {0}")]
    Registry(String),
    #[error("Compression error: {0}")]
    Compression(String),
    /// Generic cryptographic operation failure.
    #[error("Cryptographic error: {0}")]
    Crypto(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
