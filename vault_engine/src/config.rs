//! Runtime configuration for the vault engine.

use crate::types::Version;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Largest accepted chunk. Also bounds how far a single chunk may inflate on download.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Raw bytes per chunk before compression
    pub chunk_size: usize,

    /// Chunks that may be prepared ahead of the one being transferred
    pub pipeline_depth: usize,

    /// DEFLATE level, 0 to 9
    pub compression_level: u32,

    /// Protocol version stamped into every record
    pub version: Version,

    pub log_dir: PathBuf,
    pub log_json: bool,
    /// `EnvFilter` directive, e.g. `info,vault_engine=debug`
    pub log_filter: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            pipeline_depth: 2,
            compression_level: 6,
            version: Version::CURRENT,
            log_dir: PathBuf::from("logs"),
            log_json: false,
            log_filter: "info".to_string(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from `VAULT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let chunk_size = match lookup("VAULT_CHUNK_SIZE") {
            Some(value) => value.trim().parse().context("VAULT_CHUNK_SIZE must be a byte count")?,
            None => defaults.chunk_size,
        };

        let pipeline_depth = match lookup("VAULT_PIPELINE_DEPTH") {
            Some(value) => value.trim().parse().context("VAULT_PIPELINE_DEPTH must be a number")?,
            None => defaults.pipeline_depth,
        };

        let compression_level = match lookup("VAULT_COMPRESSION_LEVEL") {
            Some(value) => value.trim().parse().context("VAULT_COMPRESSION_LEVEL must be 0-9")?,
            None => defaults.compression_level,
        };

        let version = match lookup("VAULT_PROTOCOL_VERSION") {
            Some(value) => {
                let bytes = hex::decode(value.trim()).context("VAULT_PROTOCOL_VERSION must be hex")?;
                if bytes.len() != Version::LEN {
                    anyhow::bail!("VAULT_PROTOCOL_VERSION must be 4 bytes (8 hex chars)");
                }
                Version::from_slice(&bytes)?
            }
            None => defaults.version,
        };

        let log_dir = lookup("VAULT_LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir);

        let log_json = match lookup("VAULT_LOG_JSON") {
            Some(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => defaults.log_json,
        };

        let log_filter = lookup("VAULT_LOG").unwrap_or(defaults.log_filter);

        let config = Self {
            chunk_size,
            pipeline_depth,
            compression_level,
            version,
            log_dir,
            log_json,
            log_filter,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            anyhow::bail!("chunk_size must be between 1 and {MAX_CHUNK_SIZE} bytes");
        }
        if self.pipeline_depth == 0 {
            anyhow::bail!("pipeline_depth must be at least 1");
        }
        if self.compression_level > 9 {
            anyhow::bail!("compression_level must be 0-9");
        }
        Ok(())
    }
}
