//! Authorization resolution and transaction signing.
//!
//! Resolves the authorities a transaction requires into the minimal signing
//! set available in the vault, anchors the transaction to the node's head
//! block, signs with the chain-bound scheme, and optionally broadcasts.
//! Nothing here mutates vault state; broadcast is the only side effect.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::blockchain::sign_state::{minimize_required_signatures, MAX_SIG_CHECK_DEPTH};
use crate::blockchain::traits::NodeClient;
use crate::core::config::{WalletConfig, MAX_EXPIRATION_SECONDS};
use crate::core::domain::{
    Account, AccountName, AnnotatedTransaction, Authority, Role, SignedTransaction, Transaction,
};
use crate::core::errors::WalletError;
use crate::core::operations;
use crate::crypto::keys::PublicKey;
use crate::vault::KeyVault;

/// Resolves approvals and signs transactions against one injected node
/// client.
pub struct AuthorizationResolver {
    node: Arc<dyn NodeClient>,
}

impl AuthorizationResolver {
    pub fn new(node: Arc<dyn NodeClient>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        &self.node
    }

    /// Signs `tx`, optionally broadcasting it synchronously.
    ///
    /// Re-queries account state on every call rather than caching, trading a
    /// round trip for freshness against authority changes. Signing is
    /// idempotent: the same operations against the same available keys yield
    /// an equivalent result, so a failed broadcast can simply be retried.
    pub async fn sign_transaction(
        &self,
        vault: &KeyVault,
        config: &WalletConfig,
        tx: Transaction,
        broadcast: bool,
    ) -> Result<AnnotatedTransaction, WalletError> {
        tx.validate()?;

        let required = operations::required_authorities(&tx.operations);

        // De-duplicated approver names across all three roles.
        let names: Vec<AccountName> = required
            .owner
            .iter()
            .chain(required.active.iter())
            .chain(required.posting.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let fetched = self.node.get_accounts(&names).await?;
        let mut accounts: HashMap<AccountName, Account> = HashMap::with_capacity(fetched.len());
        for (name, record) in names.iter().zip(fetched) {
            match record {
                Some(account) => {
                    accounts.insert(name.clone(), account);
                }
                // A missing approver cannot contribute signatures; resolution
                // continues and fails later only if its weight was needed.
                None => warn!(%name, "required approver does not exist, excluding"),
            }
        }

        let role_sets = [
            (Role::Owner, &required.owner),
            (Role::Active, &required.active),
            (Role::Posting, &required.posting),
        ];

        // Candidate keys: directly held keys of each required authority.
        // Single level only; keys behind a further delegation are not
        // expanded, so transactions relying on them are not signable here.
        let mut candidates: BTreeSet<PublicKey> = BTreeSet::new();
        for (role, names) in &role_sets {
            for name in names.iter() {
                if let Some(account) = accounts.get(name) {
                    candidates.extend(account.authority(*role).keys().copied());
                }
            }
        }
        for authority in &required.other {
            candidates.extend(authority.keys().copied());
        }

        let vault_keys = vault.public_keys()?;
        let available: BTreeSet<PublicKey> =
            candidates.intersection(&vault_keys).copied().collect();

        let mut required_authorities: Vec<Authority> = Vec::new();
        for (role, names) in &role_sets {
            for name in names.iter() {
                if let Some(account) = accounts.get(name) {
                    required_authorities.push(account.authority(*role).clone());
                }
            }
        }
        required_authorities.extend(required.other.iter().cloned());

        let selected = minimize_required_signatures(
            &required_authorities,
            &available,
            &accounts,
            MAX_SIG_CHECK_DEPTH,
        )?;
        debug!(selected = selected.len(), available = available.len(), "signing set resolved");

        let props = self.node.get_dynamic_global_properties().await?;
        let mut tx = tx;
        tx.set_reference_block(&props.head_block_id)?;
        let window = config.tx_expiration_seconds.min(MAX_EXPIRATION_SECONDS);
        tx.expiration = props.time + Duration::seconds(i64::from(window));

        // A fresh signature set: anything stale from an earlier signing
        // round must not survive.
        let mut signed = SignedTransaction::new(tx);
        let digest = signed.signing_digest(&config.chain_id_bytes()?)?;
        for key in &selected {
            let private = vault.private_key(key)?;
            signed.signatures.push(private.sign_digest(&digest));
        }

        if broadcast {
            match self.node.broadcast_transaction_synchronous(&signed).await {
                Ok(receipt) => {
                    debug!(block_num = receipt.block_num, "transaction broadcast");
                    Ok(AnnotatedTransaction::broadcast(signed, receipt))
                }
                Err(WalletError::Remote(message)) => {
                    warn!(%message, "broadcast failed, signed transaction retained");
                    Err(WalletError::Broadcast { message, transaction: Box::new(signed) })
                }
                Err(other) => Err(other),
            }
        } else {
            Ok(AnnotatedTransaction::unbroadcast(signed))
        }
    }
}
