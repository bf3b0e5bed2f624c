//! High-level wallet session tying the vault, staging table, and resolver
//! together behind one API.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::blockchain::authorization::AuthorizationResolver;
use crate::blockchain::staging::{TransactionHandle, TransactionStaging};
use crate::blockchain::traits::NodeClient;
use crate::core::config::WalletConfig;
use crate::core::domain::{
    Account, AccountName, AnnotatedTransaction, Asset, Authority, DynamicGlobalProperties,
    Transaction,
};
use crate::core::errors::WalletError;
use crate::core::operations::Operation;
use crate::crypto::derivation::{self, BrainKeyInfo};
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::crypto::memo;
use crate::storage::WalletData;
use crate::vault::KeyVault;

/// One wallet session: a vault of keys, a staging table, and a resolver
/// bound to an injected node client.
///
/// Not safe for unsynchronized concurrent use; callers needing concurrency
/// serialize access externally.
pub struct Wallet {
    vault: KeyVault,
    staging: TransactionStaging,
    resolver: AuthorizationResolver,
    config: WalletConfig,
}

impl Wallet {
    pub fn new(node: Arc<dyn NodeClient>, config: WalletConfig) -> Self {
        Self {
            vault: KeyVault::new(),
            staging: TransactionStaging::new(),
            resolver: AuthorizationResolver::new(node),
            config,
        }
    }

    /// Rebuilds a session from a persisted record. The vault comes back
    /// locked.
    pub fn from_record(node: Arc<dyn NodeClient>, record: &WalletData) -> Result<Self, WalletError> {
        let mut config = WalletConfig::default();
        config.server_endpoint = record.server_endpoint.clone();
        Ok(Self {
            vault: KeyVault::from_cipher_blob(record.cipher_blob()?),
            staging: TransactionStaging::new(),
            resolver: AuthorizationResolver::new(node),
            config,
        })
    }

    /// Re-encrypts the vault and writes the persisted record.
    pub fn save(&mut self, path: &Path) -> Result<(), WalletError> {
        self.vault.encrypt_keys()?;
        WalletData::new(self.config.server_endpoint.clone(), self.vault.cipher_blob()).save(path)?;
        info!(path = %path.display(), "wallet saved");
        Ok(())
    }

    // ----- vault ---------------------------------------------------------

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut KeyVault {
        &mut self.vault
    }

    pub fn is_locked(&self) -> bool {
        self.vault.is_locked()
    }

    pub fn lock(&mut self) -> Result<(), WalletError> {
        self.vault.lock()
    }

    pub fn unlock(&mut self, password: &str) -> Result<(), WalletError> {
        self.vault.unlock(password)
    }

    pub fn set_password(&mut self, password: &str) -> Result<(), WalletError> {
        self.vault.set_password(password)
    }

    /// Imports a WIF private key into the unlocked vault.
    pub fn import_key(&mut self, wif: &str) -> Result<bool, WalletError> {
        self.vault.import(PrivateKey::from_wif(wif)?)
    }

    pub fn export_key(&self, public: &PublicKey) -> Result<String, WalletError> {
        self.vault.export_wif(public)
    }

    // ----- key derivation ------------------------------------------------

    pub fn suggest_brain_key(&self) -> BrainKeyInfo {
        derivation::suggest_brain_key()
    }

    pub fn normalize_brain_key(&self, phrase: &str) -> String {
        derivation::normalize_brain_key(phrase)
    }

    // ----- configuration -------------------------------------------------

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn set_transaction_expiration(&mut self, seconds: u32) -> Result<(), WalletError> {
        self.config.set_tx_expiration(seconds)
    }

    // ----- node queries --------------------------------------------------

    pub async fn info(&self) -> Result<DynamicGlobalProperties, WalletError> {
        self.resolver.node().get_dynamic_global_properties().await
    }

    pub async fn get_account(&self, name: &str) -> Result<Account, WalletError> {
        let mut accounts = self.resolver.node().get_accounts(&[name.to_string()]).await?;
        accounts
            .pop()
            .flatten()
            .ok_or_else(|| WalletError::NotFound(format!("unknown account {name}")))
    }

    // ----- memos ---------------------------------------------------------

    /// Encrypts a `#`-prefixed memo between two accounts' memo keys;
    /// anything else passes through unchanged.
    pub async fn get_encrypted_memo(
        &self,
        from: &str,
        to: &str,
        text: &str,
    ) -> Result<String, WalletError> {
        if !text.starts_with(memo::MEMO_SENTINEL) {
            return Ok(text.to_string());
        }
        let from_account = self.get_account(from).await?;
        let to_account = self.get_account(to).await?;
        memo::encrypt_memo(&self.vault, &from_account.memo_key, &to_account.memo_key, text)
    }

    /// Best-effort decryption of historical memo text.
    pub fn decrypt_memo(&self, text: &str) -> String {
        memo::decrypt_memo(&self.vault, text)
    }

    // ----- signing -------------------------------------------------------

    pub async fn sign_transaction(
        &self,
        tx: Transaction,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        self.resolver.sign_transaction(&self.vault, &self.config, tx, broadcast).await
    }

    async fn sign_operations(
        &self,
        operations: Vec<Operation>,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        let tx = Transaction::new(operations);
        tx.validate()?;
        self.sign_transaction(tx, broadcast).await
    }

    // ----- operation builders -------------------------------------------

    pub async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: Asset,
        memo_text: &str,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        if self.is_locked() {
            return Err(WalletError::Auth("vault must be unlocked to transfer".into()));
        }
        let memo_text = self.get_encrypted_memo(from, to, memo_text).await?;
        let op = Operation::Transfer {
            from: from.into(),
            to: to.into(),
            amount,
            memo: memo_text,
        };
        self.sign_operations(vec![op], broadcast).await
    }

    /// Creates an account from four freshly suggested brain keys, importing
    /// all of them so the new account is controllable from this wallet.
    pub async fn create_account(
        &mut self,
        creator: &str,
        new_account_name: &str,
        fee: Asset,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        if self.is_locked() {
            return Err(WalletError::Auth("vault must be unlocked to create accounts".into()));
        }
        let owner = derivation::suggest_brain_key();
        let active = derivation::suggest_brain_key();
        let posting = derivation::suggest_brain_key();
        let memo_key = derivation::suggest_brain_key();
        for key in [&owner, &active, &posting, &memo_key] {
            self.vault.import(PrivateKey::from_wif(&key.wif_private_key)?)?;
        }
        let op = Operation::AccountCreate {
            creator: creator.into(),
            new_account_name: new_account_name.into(),
            fee,
            owner: Authority::single_key(owner.public_key),
            active: Authority::single_key(active.public_key),
            posting: Authority::single_key(posting.public_key),
            memo_key: memo_key.public_key,
        };
        self.sign_operations(vec![op], broadcast).await
    }

    /// Creates an account whose active and memo keys are derived as the
    /// first unused children of `owner_key`, so the whole account recovers
    /// from a single secret.
    pub async fn create_account_with_key(
        &mut self,
        owner_key: &PrivateKey,
        creator: &str,
        new_account_name: &str,
        fee: Asset,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        let active_index = derivation::find_first_unused(&self.vault, owner_key)?;
        let active_key = derivation::derive_private_key(&owner_key.to_wif(), active_index);
        let memo_index = derivation::find_first_unused(&self.vault, &active_key)?;
        let memo_key = derivation::derive_private_key(&active_key.to_wif(), memo_index);

        let op = Operation::AccountCreate {
            creator: creator.into(),
            new_account_name: new_account_name.into(),
            fee,
            owner: Authority::single_key(owner_key.public_key()),
            active: Authority::single_key(active_key.public_key()),
            posting: Authority::single_key(active_key.public_key()),
            memo_key: memo_key.public_key(),
        };

        self.vault.import(active_key)?;
        self.vault.import(memo_key)?;
        self.sign_operations(vec![op], broadcast).await
    }

    pub async fn update_account(
        &self,
        account: &str,
        owner: Option<Authority>,
        active: Option<Authority>,
        posting: Option<Authority>,
        memo_key: Option<PublicKey>,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        let op = Operation::AccountUpdate {
            account: account.into(),
            owner,
            active,
            posting,
            memo_key,
        };
        self.sign_operations(vec![op], broadcast).await
    }

    pub async fn vote(
        &self,
        voter: &str,
        author: &str,
        permlink: &str,
        weight: i16,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        let op = Operation::Vote {
            voter: voter.into(),
            author: author.into(),
            permlink: permlink.into(),
            weight,
        };
        self.sign_operations(vec![op], broadcast).await
    }

    pub async fn set_voting_proxy(
        &self,
        account: &str,
        proxy: &str,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        let op = Operation::WitnessProxy { account: account.into(), proxy: proxy.into() };
        self.sign_operations(vec![op], broadcast).await
    }

    // ----- staged transactions ------------------------------------------

    pub fn begin_staged(&mut self) -> TransactionHandle {
        self.staging.begin()
    }

    pub fn add_staged_operation(
        &mut self,
        handle: TransactionHandle,
        op: Operation,
    ) -> Result<(), WalletError> {
        self.staging.add_operation(handle, op)
    }

    pub fn replace_staged_operation(
        &mut self,
        handle: TransactionHandle,
        index: usize,
        op: Operation,
    ) -> Result<(), WalletError> {
        self.staging.replace_operation(handle, index, op)
    }

    pub fn copy_staged_operation(
        &mut self,
        src: TransactionHandle,
        dst: TransactionHandle,
        index: usize,
    ) -> Result<(), WalletError> {
        self.staging.copy_operation(src, dst, index)
    }

    pub fn preview_staged(
        &self,
        handle: TransactionHandle,
    ) -> Result<crate::core::domain::SignedTransaction, WalletError> {
        self.staging.preview(handle)
    }

    pub fn remove_staged(&mut self, handle: TransactionHandle) -> Result<(), WalletError> {
        self.staging.remove(handle)
    }

    pub async fn sign_staged(
        &mut self,
        handle: TransactionHandle,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        self.staging.sign(handle, &self.resolver, &self.vault, &self.config, broadcast).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn propose_staged(
        &mut self,
        handle: TransactionHandle,
        author: AccountName,
        title: String,
        memo_text: String,
        expiration_time: DateTime<Utc>,
        review_period_time: Option<DateTime<Utc>>,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        self.staging
            .propose(
                handle,
                &self.resolver,
                &self.vault,
                &self.config,
                author,
                title,
                memo_text,
                expiration_time,
                review_period_time,
                broadcast,
            )
            .await
    }
}
