//! Vault Engine Core Library
//!
//! Seals a byte stream so that only a chosen, weighted set of key holders can rebuild it:
//! chunks are hashed into a chain, compressed and encrypted under a per-vault sealing key, and
//! that key is threshold-shared across recipients on ed25519, sr25519 and secp256k1.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod schema;
pub mod seal;
pub mod types;
pub mod vault;

pub use config::VaultConfig;
pub use crypto::{CurveType, KeyPair, ProofOfAccess, PublicKey, SecretKey, SymmetricKey};
pub use error::{Result, VaultError};
pub use metadata::{PreSealed, Sealed, combine_sealed_data};
pub use schema::EncryptionSchema;
pub use seal::{CombinedCipher, Seal, Sealer};
pub use types::{Cancellation, Cid, Version};
pub use vault::Vault;
pub use vault::backend::{BackendError, ByteStore, MemoryRegistry, MemoryStore, Registry, StoreReceipt};
