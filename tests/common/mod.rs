//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use quorum_wallet::blockchain::testing::MockNode;
use quorum_wallet::core::domain::{Account, Authority};
use quorum_wallet::{PrivateKey, Wallet, WalletConfig};

pub const PASSWORD: &str = "integration-password";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Account where every role is a single-key authority over `key`.
pub fn simple_account(name: &str, key: &PrivateKey) -> Account {
    Account {
        name: name.into(),
        owner: Authority::single_key(key.public_key()),
        active: Authority::single_key(key.public_key()),
        posting: Authority::single_key(key.public_key()),
        memo_key: key.public_key(),
    }
}

/// Unlocked wallet backed by a mock node serving `accounts`.
pub fn unlocked_wallet(accounts: Vec<Account>) -> Wallet {
    init_tracing();
    let node = Arc::new(MockNode::with_accounts(accounts));
    let mut wallet = Wallet::new(node, WalletConfig::default());
    wallet.set_password(PASSWORD).unwrap();
    wallet.unlock(PASSWORD).unwrap();
    wallet
}
