//! Client-side credential custody and transaction authorization for a
//! weighted-authority blockchain.
//!
//! The wallet holds private keys encrypted at rest, derives keys
//! deterministically, resolves an account's layered weighted-threshold
//! authorities into a minimal signing set, signs with a chain-bound scheme,
//! and encrypts confidential memo text — without key material ever leaving
//! the process or reaching the remote node.

pub mod blockchain;
pub mod core;
pub mod crypto;
pub mod storage;
pub mod vault;

pub use crate::blockchain::{AuthorizationResolver, JsonRpcNodeClient, NodeClient, TransactionStaging};
pub use crate::core::{Wallet, WalletConfig, WalletError};
pub use crate::crypto::{PrivateKey, PublicKey};
pub use crate::storage::WalletData;
pub use crate::vault::KeyVault;
