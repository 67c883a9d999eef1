//! The vault driver: seal content into the store and register it, recover it, re-key it,
//! and prove access to it.
//!
//! Every public operation runs under a fresh operation id, leaves exactly one audit record
//! (success or error) and surfaces collaborator failures unchanged.

pub mod backend;

use crate::audit::{AuditEventType, AuditRecord, AuditTracker};
use crate::config::VaultConfig;
use crate::crypto::hash::{HashProvider, Sha256Hasher};
use crate::crypto::signing::{self, ProofOfAccess};
use crate::error::{Result, VaultError};
use crate::metadata::{PreSealed, Sealed};
use crate::pipeline::{self, Metadata};
use crate::schema::EncryptionSchema;
use crate::seal::{Seal, Sealer};
use crate::types::{Cancellation, Cid};
use backend::{ByteStore, Registry};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{info, info_span};
use uuid::Uuid;
use zeroize::Zeroizing;

pub struct Vault {
    store: Arc<dyn ByteStore>,
    registry: Arc<dyn Registry>,
    hasher: Arc<dyn HashProvider>,
    config: VaultConfig,
    seal: Seal,
    audit: Arc<AuditTracker>,
    cancellation: Cancellation,
}

impl Vault {
    pub fn new(store: Arc<dyn ByteStore>, registry: Arc<dyn Registry>, config: VaultConfig) -> Result<Self> {
        config.validate().map_err(|e| VaultError::Config(e.to_string()))?;
        Ok(Self {
            store,
            registry,
            hasher: Arc::new(Sha256Hasher),
            seal: Seal::new(config.version),
            config,
            audit: Arc::new(AuditTracker::default()),
            cancellation: Cancellation::new(),
        })
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn HashProvider>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditTracker>) -> Self {
        self.audit = audit;
        self
    }

    /// Replace the cancellation token. Once a token is cancelled every later operation
    /// on this vault fails with [`VaultError::Cancelled`] until a fresh token is installed.
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn audit(&self) -> &AuditTracker {
        &self.audit
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Chunk, encrypt and store `reader`, seal the resulting record under `schema`, store the
    /// bundle and register it. Returns the new secret id.
    pub fn upstream<R: Read>(&self, reader: R, schema: &EncryptionSchema) -> Result<u32> {
        self.audited(
            AuditEventType::Upstream,
            None,
            || {
                schema.validate()?;
                self.cancellation.check()?;

                let mut metadata = Metadata::new(&self.seal);
                let list_cid = pipeline::upload_chunks(
                    reader,
                    &mut metadata,
                    self.store.as_ref(),
                    self.hasher.as_ref(),
                    &self.config,
                    &self.cancellation,
                )?;
                let chunk_count = metadata.chunks().len();
                let sealed = metadata.seal(&list_cid, schema)?;

                self.cancellation.check()?;
                let bundle = self.store_sealed(&sealed)?;
                let secret_id = self
                    .registry
                    .register_secret(bundle.as_bytes())
                    .map_err(|e| VaultError::Registry(e.to_string()))?;

                info!(secret_id, chunks = chunk_count, bundle = %bundle, "vault registered");
                Ok(secret_id)
            },
            |secret_id| (Some(*secret_id), format!("registered secret {secret_id}")),
        )
    }

    /// Recover the content behind `secret_id` into `writer`.
    ///
    /// Plaintext is streamed as chunks open, but it is only trustworthy once this returns `Ok`;
    /// on any error the caller must discard what was written.
    pub fn downstream<W: Write>(&self, secret_id: u32, sealer: &Sealer, writer: W) -> Result<u64> {
        self.audited(
            AuditEventType::Downstream,
            Some(secret_id),
            || {
                let pre_sealed = self.recover_record(secret_id, sealer)?;
                pipeline::download_chunks(
                    &pre_sealed,
                    self.store.as_ref(),
                    self.hasher.as_ref(),
                    writer,
                    &self.config,
                    &self.cancellation,
                )
            },
            |written| (Some(secret_id), format!("recovered {written} bytes")),
        )
    }

    /// Open the sealed record of `secret_id` without touching chunk data.
    pub fn recover_pre_sealed(&self, secret_id: u32, sealer: &Sealer) -> Result<PreSealed> {
        self.recover_record(secret_id, sealer)
    }

    /// Re-seal the existing record under `new_schema` and point the registry at the new bundle.
    /// Chunk data and the sealing key are left untouched.
    pub fn update_encryption_schema(
        &self,
        secret_id: u32,
        new_schema: &EncryptionSchema,
        sealer: &Sealer,
    ) -> Result<bool> {
        self.audited(
            AuditEventType::Rekey,
            Some(secret_id),
            || {
                new_schema.validate()?;
                let pre_sealed = self.recover_record(secret_id, sealer)?;
                let payload = Zeroizing::new(pre_sealed.serialize()?);

                let sealed = self.seal.seal(&payload, new_schema)?;
                self.cancellation.check()?;
                let bundle = self.store_sealed(&sealed)?;

                let updated = self
                    .registry
                    .update_metadata(secret_id, bundle.as_bytes())
                    .map_err(|e| VaultError::Registry(e.to_string()))?;

                info!(secret_id, updated, bundle = %bundle, "encryption schema replaced");
                Ok(updated)
            },
            |updated| {
                let message = if *updated { "schema replaced" } else { "registry declined update" };
                (Some(secret_id), message.to_string())
            },
        )
    }

    /// Sign `message` with the vault's sealing key, proving the holder of `sealer` can recover it.
    pub fn generate_proof_of_access(&self, secret_id: u32, sealer: &Sealer, message: &[u8]) -> Result<ProofOfAccess> {
        self.audited(
            AuditEventType::ProofOfAccess,
            Some(secret_id),
            || {
                let pre_sealed = self.recover_record(secret_id, sealer)?;
                ProofOfAccess::sign(&pre_sealed.sealing_key, message)
            },
            |proof| (Some(secret_id), format!("signed as {}", proof.address)),
        )
    }

    /// Address that proofs of access for `secret_id` must recover to.
    pub fn sealing_address(&self, secret_id: u32, sealer: &Sealer) -> Result<String> {
        let pre_sealed = self.recover_record(secret_id, sealer)?;
        signing::sealing_key_address(&pre_sealed.sealing_key)
    }

    /// Offline check of a proof against its embedded address.
    pub fn verify_proof_of_access(proof: &ProofOfAccess) -> bool {
        proof.verify()
    }

    fn recover_record(&self, secret_id: u32, sealer: &Sealer) -> Result<PreSealed> {
        self.cancellation.check()?;
        let sealed = self.load_sealed(secret_id)?;
        let payload = Zeroizing::new(self.seal.recover(&sealed, sealer)?);
        PreSealed::deserialize(&payload)
    }

    fn load_sealed(&self, secret_id: u32) -> Result<Sealed> {
        let metadata = self
            .registry
            .get_metadata(secret_id)
            .map_err(|e| VaultError::Registry(e.to_string()))?;
        let bundle = Cid::from_slice(&metadata)?;

        let bytes = self
            .store
            .cat(bundle.as_str())
            .map_err(|e| VaultError::Store(e.to_string()))?;
        Sealed::deserialize(&bytes)
    }

    fn store_sealed(&self, sealed: &Sealed) -> Result<Cid> {
        let bytes = sealed.serialize()?;
        let receipt = self
            .store
            .add(&bytes)
            .map_err(|e| VaultError::Store(e.to_string()))?;
        Cid::parse(&receipt.id)
    }

    /// Run `op` under a fresh operation id and leave one audit record for it.
    fn audited<T>(
        &self,
        event: AuditEventType,
        secret_id: Option<u32>,
        op: impl FnOnce() -> Result<T>,
        describe: impl FnOnce(&T) -> (Option<u32>, String),
    ) -> Result<T> {
        let operation_id = Uuid::new_v4().to_string();
        let span = info_span!("vault_op", operation_id = %operation_id, event = ?event);
        let _entered = span.enter();

        match op() {
            Ok(value) => {
                let (secret_id, message) = describe(&value);
                self.audit.log(AuditRecord::new(event, &operation_id, secret_id, message));
                Ok(value)
            }
            Err(e) => {
                self.audit.log(AuditRecord::new(
                    AuditEventType::Error,
                    &operation_id,
                    secret_id,
                    format!("{event:?} failed: {e}"),
                ));
                Err(e)
            }
        }
    }
}
