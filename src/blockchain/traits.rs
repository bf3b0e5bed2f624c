use async_trait::async_trait;

use crate::core::domain::{Account, AccountName, BroadcastResult, DynamicGlobalProperties, SignedTransaction};
use crate::core::errors::WalletError;

/// Query and broadcast contract consumed from the remote full node.
///
/// Implementations are dependency-injected into the resolver at
/// construction; the wallet never reaches for a process-wide client. All
/// calls block the logical caller until the node answers — timeouts and
/// cancellation belong to the transport.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Fetches full account records by name. The node returns `None` for
    /// names that do not exist, in input order.
    async fn get_accounts(&self, names: &[AccountName]) -> Result<Vec<Option<Account>>, WalletError>;

    /// Head-block snapshot used to anchor transactions.
    async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, WalletError>;

    /// Submits a signed transaction and waits for its inclusion receipt.
    async fn broadcast_transaction_synchronous(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<BroadcastResult, WalletError>;
}
