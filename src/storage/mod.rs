//! Persisted wallet record.
//!
//! A single JSON document holding the node endpoint and the vault's
//! encrypted key blob, loaded wholesale and saved by full rewrite. Writes
//! go through a best-effort restrictive-permission path on Unix. Plaintext
//! key material never appears here; the blob is produced by the vault at
//! its serialization boundary.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::WalletError;

/// On-disk wallet record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletData {
    /// Node RPC endpoint this wallet talks to.
    pub server_endpoint: String,
    /// Encrypted key blob, hex encoded.
    pub cipher_keys: String,
}

impl WalletData {
    pub fn new(server_endpoint: impl Into<String>, cipher_blob: &[u8]) -> Self {
        Self { server_endpoint: server_endpoint.into(), cipher_keys: hex::encode(cipher_blob) }
    }

    pub fn cipher_blob(&self) -> Result<Vec<u8>, WalletError> {
        hex::decode(&self.cipher_keys)
            .map_err(|e| WalletError::Storage(format!("corrupt cipher blob: {e}")))
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)
            .map_err(|e| WalletError::Storage(format!("failed to read wallet file: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| WalletError::Storage(format!("failed to parse wallet file: {e}")))
    }

    /// Serializes in memory first, then rewrites the file, so a failure
    /// mid-serialization cannot leave a half-written record behind.
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        debug!(path = %path.display(), "saving wallet record");

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(json.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, json)?;
        }

        Ok(())
    }
}
