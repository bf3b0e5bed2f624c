use thiserror::Error;

use crate::core::domain::SignedTransaction;

/// Error taxonomy for wallet operations.
///
/// Vault and staging failures are local and leave state unchanged. Broadcast
/// failures carry the signed transaction so the caller can retry without
/// re-resolving authorities.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Vault locked, wrong password, or re-entrant lock misuse.
    #[error("authorization failure: {0}")]
    Auth(String),

    /// Missing key, staging handle, or account.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation index outside the staged transaction.
    #[error("index out of range: {0}")]
    OutOfRange(String),

    /// Required authorities cannot be satisfied with the available keys.
    #[error("insufficient signing keys: {0}")]
    InsufficientKeys(String),

    /// Transport or node failure on a query.
    #[error("remote node error: {0}")]
    Remote(String),

    /// Synchronous broadcast failed after signing. The signed transaction is
    /// intact and safe to retry; signing has no side effects.
    #[error("broadcast failed: {message}")]
    Broadcast {
        message: String,
        transaction: Box<SignedTransaction>,
    },

    /// Malformed operation input (zero authority threshold, vote weight out
    /// of bounds, empty account name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Key material or cipher failure.
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// Persisted wallet record could not be read or written.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl WalletError {
    /// True when the caller may retry the same call without re-building state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Remote(_) | WalletError::Broadcast { .. })
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Storage(err.to_string())
    }
}
