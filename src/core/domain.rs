//! Chain domain model: authorities, accounts, and transactions.
//!
//! These mirror the node's records closely enough to deserialize its JSON
//! responses directly. The binary (postcard) rendering of a [`Transaction`]
//! is the canonical signing encoding; keys and signatures switch to raw
//! bytes there via their own serde implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::WalletError;
use crate::crypto::keys::{CompactSignature, PublicKey};

/// Chain account names are plain lowercase strings, validated by the node.
pub type AccountName = String;

/// The three authority tiers of an account, in increasing order of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Recovery-grade operations (key rotation, account recovery).
    Owner,
    /// Financial operations (transfers, witness updates).
    Active,
    /// Low-stakes social operations (votes, posts).
    Posting,
}

/// A token amount with its symbol, e.g. `1.000 QRM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub amount: u64,
    pub symbol: String,
}

impl Asset {
    pub fn new(amount: u64, symbol: impl Into<String>) -> Self {
        Self { amount, symbol: symbol.into() }
    }
}

/// Weighted-threshold structure controlling one role of an account.
///
/// Satisfied when the summed weights of approving keys and delegated
/// accounts reach `weight_threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    /// Delegated sub-accounts and their weights, resolved via the node.
    pub account_auths: Vec<(AccountName, u16)>,
    /// Directly held keys and their weights.
    pub key_auths: Vec<(PublicKey, u16)>,
}

impl Authority {
    /// Single-key authority with threshold 1, the shape used for fresh
    /// accounts.
    pub fn single_key(key: PublicKey) -> Self {
        Self { weight_threshold: 1, account_auths: Vec::new(), key_auths: vec![(key, 1)] }
    }

    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.key_auths.iter().map(|(key, _)| key)
    }

    /// A zero threshold is trivially satisfied and therefore never valid on
    /// a role definition.
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.weight_threshold == 0 {
            return Err(WalletError::Validation("authority threshold must be positive".into()));
        }
        Ok(())
    }
}

/// Account record as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    /// Dedicated non-weighted key used only for confidential memos.
    pub memo_key: PublicKey,
}

impl Account {
    pub fn authority(&self, role: Role) -> &Authority {
        match role {
            Role::Owner => &self.owner,
            Role::Active => &self.active,
            Role::Posting => &self.posting,
        }
    }
}

/// Head-block snapshot used to anchor transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u32,
    /// 20-byte block id, hex encoded.
    pub head_block_id: String,
    pub time: DateTime<Utc>,
}

/// Receipt from a synchronous broadcast.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub block_num: u32,
    pub trx_num: u32,
}

/// Unsigned transaction anchored to a recent block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expiration: DateTime<Utc>,
    pub operations: Vec<crate::core::operations::Operation>,
}

impl Transaction {
    pub fn new(operations: Vec<crate::core::operations::Operation>) -> Self {
        Self {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: DateTime::<Utc>::UNIX_EPOCH,
            operations,
        }
    }

    /// Anchors the transaction to a head block id (20 bytes, hex): the low
    /// 16 bits of the block number plus a 32-bit prefix drawn from the id.
    pub fn set_reference_block(&mut self, head_block_id: &str) -> Result<(), WalletError> {
        let id = hex::decode(head_block_id)
            .map_err(|e| WalletError::Remote(format!("malformed head block id: {e}")))?;
        if id.len() != 20 {
            return Err(WalletError::Remote("malformed head block id length".into()));
        }
        self.ref_block_num = u16::from_be_bytes([id[2], id[3]]);
        self.ref_block_prefix = u32::from_le_bytes([id[4], id[5], id[6], id[7]]);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.operations.is_empty() {
            return Err(WalletError::Validation("transaction has no operations".into()));
        }
        for op in &self.operations {
            op.validate()?;
        }
        Ok(())
    }
}

/// A transaction plus the signatures gathered for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub signatures: Vec<CompactSignature>,
}

impl SignedTransaction {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction, signatures: Vec::new() }
    }

    /// Digest that signatures commit to: SHA-256 over the chain id followed
    /// by the canonical binary encoding. Binding the chain id prevents
    /// cross-chain replay.
    pub fn signing_digest(&self, chain_id: &[u8; 32]) -> Result<[u8; 32], WalletError> {
        use sha2::{Digest, Sha256};
        let encoded = postcard::to_allocvec(&self.transaction)
            .map_err(|e| WalletError::Crypto(format!("transaction encoding failed: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(chain_id);
        hasher.update(&encoded);
        Ok(hasher.finalize().into())
    }
}

/// Signed transaction annotated with its inclusion receipt when it was
/// broadcast synchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedTransaction {
    #[serde(flatten)]
    pub signed: SignedTransaction,
    pub block_num: Option<u32>,
    pub trx_num: Option<u32>,
}

impl AnnotatedTransaction {
    pub fn unbroadcast(signed: SignedTransaction) -> Self {
        Self { signed, block_num: None, trx_num: None }
    }

    pub fn broadcast(signed: SignedTransaction, receipt: BroadcastResult) -> Self {
        Self { signed, block_num: Some(receipt.block_num), trx_num: Some(receipt.trx_num) }
    }
}
