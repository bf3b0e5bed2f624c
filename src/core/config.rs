//! Wallet session configuration.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::WalletError;

/// Default transaction expiration window, in seconds past head-block time.
pub const DEFAULT_EXPIRATION_SECONDS: u32 = 30;

/// Upper bound the node accepts for an expiration window.
pub const MAX_EXPIRATION_SECONDS: u32 = 3600;

/// Configuration for a wallet session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Node RPC endpoint URL.
    #[serde(default = "WalletConfig::default_endpoint")]
    pub server_endpoint: String,

    /// Chain identifier, hex encoded, mixed into every signing digest.
    #[serde(default = "WalletConfig::default_chain_id")]
    pub chain_id: String,

    /// Seconds past head-block time before a signed transaction expires.
    #[serde(default = "WalletConfig::default_expiration")]
    pub tx_expiration_seconds: u32,
}

impl WalletConfig {
    fn default_endpoint() -> String {
        "http://localhost:8090".to_string()
    }

    fn default_chain_id() -> String {
        hex::encode(Sha256::digest(b"quorum-testnet"))
    }

    fn default_expiration() -> u32 {
        DEFAULT_EXPIRATION_SECONDS
    }

    /// Parses the configured chain id into the 32-byte form used for
    /// signing.
    pub fn chain_id_bytes(&self) -> Result<[u8; 32], WalletError> {
        let bytes = hex::decode(&self.chain_id)
            .map_err(|e| WalletError::Validation(format!("invalid chain id: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| WalletError::Validation("chain id must be 32 bytes".into()))
    }

    /// Updates the expiration window, enforcing the node's cap.
    pub fn set_tx_expiration(&mut self, seconds: u32) -> Result<(), WalletError> {
        if seconds >= MAX_EXPIRATION_SECONDS {
            return Err(WalletError::Validation(format!(
                "expiration window {seconds}s exceeds maximum {MAX_EXPIRATION_SECONDS}s"
            )));
        }
        self.tx_expiration_seconds = seconds;
        Ok(())
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            server_endpoint: Self::default_endpoint(),
            chain_id: Self::default_chain_id(),
            tx_expiration_seconds: Self::default_expiration(),
        }
    }
}
