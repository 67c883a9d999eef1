//! Cryptographic building blocks: curve-tagged keys, recipient envelopes,
//! chunk sealing, hashing and proof-of-access signatures.

pub mod asymmetric;
pub mod hash;
pub mod keys;
pub mod signing;
pub mod symmetric;

pub use hash::{HashChain, HashProvider, Sha256Hasher};
pub use keys::{CurveType, KeyPair, PublicKey, SecretKey};
pub use signing::ProofOfAccess;
pub use symmetric::SymmetricKey;
