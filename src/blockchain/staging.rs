//! Multi-step transaction assembly.
//!
//! Staged transactions are mutable operation lists referenced by an integer
//! handle until they are signed, proposed, or removed. Handle allocation is
//! `max existing + 1`, restarting from 0 once the table empties.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::blockchain::authorization::AuthorizationResolver;
use crate::core::config::WalletConfig;
use crate::core::domain::{AccountName, AnnotatedTransaction, SignedTransaction, Transaction};
use crate::core::errors::WalletError;
use crate::core::operations::Operation;
use crate::vault::KeyVault;

pub type TransactionHandle = u32;

/// Table of in-progress transactions for one wallet session.
#[derive(Default)]
pub struct TransactionStaging {
    table: BTreeMap<TransactionHandle, SignedTransaction>,
}

impl TransactionStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a handle and stages an empty transaction under it.
    pub fn begin(&mut self) -> TransactionHandle {
        let handle = self.table.keys().next_back().map_or(0, |last| last + 1);
        self.table.insert(handle, SignedTransaction::new(Transaction::new(Vec::new())));
        debug!(handle, "staged transaction opened");
        handle
    }

    fn staged_mut(&mut self, handle: TransactionHandle) -> Result<&mut SignedTransaction, WalletError> {
        self.table
            .get_mut(&handle)
            .ok_or_else(|| WalletError::NotFound(format!("no staged transaction {handle}")))
    }

    fn staged(&self, handle: TransactionHandle) -> Result<&SignedTransaction, WalletError> {
        self.table
            .get(&handle)
            .ok_or_else(|| WalletError::NotFound(format!("no staged transaction {handle}")))
    }

    pub fn add_operation(
        &mut self,
        handle: TransactionHandle,
        op: Operation,
    ) -> Result<(), WalletError> {
        self.staged_mut(handle)?.transaction.operations.push(op);
        Ok(())
    }

    /// Copies one operation from `src` onto the end of `dst`.
    pub fn copy_operation(
        &mut self,
        src: TransactionHandle,
        dst: TransactionHandle,
        index: usize,
    ) -> Result<(), WalletError> {
        self.staged(dst)?;
        let source = self.staged(src)?;
        let op = source
            .transaction
            .operations
            .get(index)
            .cloned()
            .ok_or_else(|| {
                WalletError::OutOfRange(format!(
                    "operation {index} of staged transaction {src} (len {})",
                    source.transaction.operations.len()
                ))
            })?;
        self.staged_mut(dst)?.transaction.operations.push(op);
        Ok(())
    }

    pub fn replace_operation(
        &mut self,
        handle: TransactionHandle,
        index: usize,
        op: Operation,
    ) -> Result<(), WalletError> {
        let staged = self.staged_mut(handle)?;
        let len = staged.transaction.operations.len();
        let slot = staged
            .transaction
            .operations
            .get_mut(index)
            .ok_or_else(|| {
                WalletError::OutOfRange(format!(
                    "operation {index} of staged transaction {handle} (len {len})"
                ))
            })?;
        *slot = op;
        Ok(())
    }

    /// Read-only snapshot of the staged transaction.
    pub fn preview(&self, handle: TransactionHandle) -> Result<SignedTransaction, WalletError> {
        self.staged(handle).cloned()
    }

    /// Discards the staged transaction.
    pub fn remove(&mut self, handle: TransactionHandle) -> Result<(), WalletError> {
        self.table
            .remove(&handle)
            .map(|_| debug!(handle, "staged transaction removed"))
            .ok_or_else(|| WalletError::NotFound(format!("no staged transaction {handle}")))
    }

    /// Signs the staged transaction and stores the signed result back under
    /// the handle. Safe to repeat; each call resolves and signs afresh.
    pub async fn sign(
        &mut self,
        handle: TransactionHandle,
        resolver: &AuthorizationResolver,
        vault: &KeyVault,
        config: &WalletConfig,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        let transaction = self.staged(handle)?.transaction.clone();
        let result = resolver.sign_transaction(vault, config, transaction, broadcast).await?;
        *self.staged_mut(handle)? = result.signed.clone();
        Ok(result)
    }

    /// Wraps the staged operation list into a single multisig proposal and
    /// signs it.
    ///
    /// Used when the caller's own keys cannot complete authorization: the
    /// proposal carries the operations on-chain for the remaining approvers.
    /// The staged content is replaced by the wrapping operation before
    /// signing.
    #[allow(clippy::too_many_arguments)]
    pub async fn propose(
        &mut self,
        handle: TransactionHandle,
        resolver: &AuthorizationResolver,
        vault: &KeyVault,
        config: &WalletConfig,
        author: AccountName,
        title: String,
        memo: String,
        expiration_time: DateTime<Utc>,
        review_period_time: Option<DateTime<Utc>>,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        let staged = self.staged(handle)?;
        let wrapper = Operation::ProposalCreate {
            author,
            title,
            memo,
            expiration_time,
            proposed_operations: staged.transaction.operations.clone(),
            review_period_time,
        };
        *self.staged_mut(handle)? = SignedTransaction::new(Transaction::new(vec![wrapper]));

        let transaction = self.staged(handle)?.transaction.clone();
        let result = resolver.sign_transaction(vault, config, transaction, broadcast).await?;
        *self.staged_mut(handle)? = result.signed.clone();
        Ok(result)
    }
}
