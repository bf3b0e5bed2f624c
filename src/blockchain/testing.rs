//! In-memory node client for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::blockchain::traits::NodeClient;
use crate::core::domain::{
    Account, AccountName, BroadcastResult, DynamicGlobalProperties, SignedTransaction,
};
use crate::core::errors::WalletError;

/// Node double serving a fixed account set and head-block snapshot.
pub struct MockNode {
    accounts: HashMap<AccountName, Account>,
    head_block_number: u32,
    head_time: DateTime<Utc>,
    fail_broadcast: Option<String>,
    broadcasts: AtomicU32,
}

impl MockNode {
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.name.clone(), a)).collect(),
            head_block_number: 0x0102_0304,
            head_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            fail_broadcast: None,
            broadcasts: AtomicU32::new(0),
        }
    }

    pub fn head_time(mut self, time: DateTime<Utc>) -> Self {
        self.head_time = time;
        self
    }

    /// Makes every broadcast fail with the given node-side message.
    pub fn failing_broadcast(mut self, message: &str) -> Self {
        self.fail_broadcast = Some(message.to_string());
        self
    }

    pub fn broadcast_count(&self) -> u32 {
        self.broadcasts.load(Ordering::SeqCst)
    }

    fn head_block_id(&self) -> String {
        let mut id = [0u8; 20];
        id[..4].copy_from_slice(&self.head_block_number.to_be_bytes());
        id[4..8].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        hex::encode(id)
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn get_accounts(&self, names: &[AccountName]) -> Result<Vec<Option<Account>>, WalletError> {
        Ok(names.iter().map(|name| self.accounts.get(name).cloned()).collect())
    }

    async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, WalletError> {
        Ok(DynamicGlobalProperties {
            head_block_number: self.head_block_number,
            head_block_id: self.head_block_id(),
            time: self.head_time,
        })
    }

    async fn broadcast_transaction_synchronous(
        &self,
        _transaction: &SignedTransaction,
    ) -> Result<BroadcastResult, WalletError> {
        if let Some(message) = &self.fail_broadcast {
            return Err(WalletError::Remote(message.clone()));
        }
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        Ok(BroadcastResult { block_num: self.head_block_number + 1, trx_num: 0 })
    }
}
