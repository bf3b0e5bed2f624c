//! Authorization resolution across accounts, roles, and weighted
//! thresholds.

mod common;

use std::sync::Arc;

use quorum_wallet::blockchain::testing::MockNode;
use quorum_wallet::blockchain::AuthorizationResolver;
use quorum_wallet::core::domain::{Account, Asset, Authority, Transaction};
use quorum_wallet::core::operations::Operation;
use quorum_wallet::core::WalletConfig;
use quorum_wallet::{KeyVault, PrivateKey, WalletError};

fn transfer(from: &str, to: &str) -> Operation {
    Operation::Transfer {
        from: from.into(),
        to: to.into(),
        amount: Asset::new(10, "QRM"),
        memo: String::new(),
    }
}

fn vote(voter: &str) -> Operation {
    Operation::Vote { voter: voter.into(), author: "author".into(), permlink: "post".into(), weight: 10_000 }
}

fn vault_with(keys: &[&PrivateKey]) -> KeyVault {
    let mut vault = KeyVault::new();
    vault.set_password("pw").unwrap();
    vault.unlock("pw").unwrap();
    for key in keys {
        vault.import((*key).clone()).unwrap();
    }
    vault
}

#[tokio::test]
async fn multi_operation_transaction_collects_all_roles() {
    common::init_tracing();
    let alice = PrivateKey::generate();
    let alice_posting = PrivateKey::generate();
    let account = Account {
        name: "alice".into(),
        owner: Authority::single_key(alice.public_key()),
        active: Authority::single_key(alice.public_key()),
        posting: Authority::single_key(alice_posting.public_key()),
        memo_key: alice.public_key(),
    };
    let node = Arc::new(MockNode::with_accounts(vec![account]));
    let resolver = AuthorizationResolver::new(node);
    let vault = vault_with(&[&alice, &alice_posting]);
    let config = WalletConfig::default();

    // Transfer needs the active key, vote needs the posting key.
    let tx = Transaction::new(vec![transfer("alice", "bob"), vote("alice")]);
    let result = resolver.sign_transaction(&vault, &config, tx, false).await.unwrap();
    assert_eq!(result.signed.signatures.len(), 2);
}

#[tokio::test]
async fn posting_key_alone_cannot_sign_a_transfer() {
    let alice = PrivateKey::generate();
    let alice_posting = PrivateKey::generate();
    let account = Account {
        name: "alice".into(),
        owner: Authority::single_key(alice.public_key()),
        active: Authority::single_key(alice.public_key()),
        posting: Authority::single_key(alice_posting.public_key()),
        memo_key: alice.public_key(),
    };
    let node = Arc::new(MockNode::with_accounts(vec![account]));
    let resolver = AuthorizationResolver::new(node);
    let vault = vault_with(&[&alice_posting]);

    let tx = Transaction::new(vec![transfer("alice", "bob")]);
    let err = resolver
        .sign_transaction(&vault, &WalletConfig::default(), tx, false)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientKeys(_)));
}

#[tokio::test]
async fn delegated_authority_is_not_expanded_for_candidates() {
    // alice's active authority delegates entirely to helper. The wallet
    // holds helper's key, but candidate collection is single level: the
    // delegated key is never gathered, so the transfer is unsignable
    // offline even though the chain would accept helper's signature.
    let helper_key = PrivateKey::generate();
    let helper = common::simple_account("helper", &helper_key);
    let alice = Account {
        name: "alice".into(),
        owner: Authority::single_key(PrivateKey::generate().public_key()),
        active: Authority {
            weight_threshold: 1,
            account_auths: vec![("helper".into(), 1)],
            key_auths: Vec::new(),
        },
        posting: Authority::single_key(PrivateKey::generate().public_key()),
        memo_key: helper_key.public_key(),
    };
    let node = Arc::new(MockNode::with_accounts(vec![alice, helper]));
    let resolver = AuthorizationResolver::new(node);
    let vault = vault_with(&[&helper_key]);

    let tx = Transaction::new(vec![transfer("alice", "bob")]);
    let err = resolver
        .sign_transaction(&vault, &WalletConfig::default(), tx, false)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientKeys(_)));
}

#[tokio::test]
async fn resolution_requeries_fresh_account_state() {
    // Two resolutions against the same node must both query accounts; the
    // mock returns consistent state, so both succeed identically. This
    // guards the no-caching contract at the seam level.
    let alice = PrivateKey::generate();
    let node = Arc::new(MockNode::with_accounts(vec![common::simple_account("alice", &alice)]));
    let resolver = AuthorizationResolver::new(node);
    let vault = vault_with(&[&alice]);
    let config = WalletConfig::default();

    let tx = Transaction::new(vec![transfer("alice", "bob")]);
    let first = resolver.sign_transaction(&vault, &config, tx.clone(), false).await.unwrap();
    let second = resolver.sign_transaction(&vault, &config, tx, false).await.unwrap();
    assert_eq!(first.signed, second.signed);
}

#[tokio::test]
async fn broadcast_error_transaction_can_be_rebroadcast() {
    let alice = PrivateKey::generate();
    let failing = Arc::new(
        MockNode::with_accounts(vec![common::simple_account("alice", &alice)])
            .failing_broadcast("node rejected"),
    );
    let resolver = AuthorizationResolver::new(failing);
    let vault = vault_with(&[&alice]);

    let tx = Transaction::new(vec![transfer("alice", "bob")]);
    let err = resolver
        .sign_transaction(&vault, &WalletConfig::default(), tx, true)
        .await
        .unwrap_err();

    let WalletError::Broadcast { transaction, .. } = err else {
        panic!("expected broadcast error");
    };

    // The retained transaction is fully signed; a healthy node accepts it
    // verbatim.
    use quorum_wallet::NodeClient;
    let healthy = MockNode::with_accounts(Vec::new());
    let receipt = healthy.broadcast_transaction_synchronous(&transaction).await.unwrap();
    assert!(receipt.block_num > 0);
}

#[tokio::test]
async fn validation_failures_abort_before_signing() {
    let alice = PrivateKey::generate();
    let node = Arc::new(MockNode::with_accounts(vec![common::simple_account("alice", &alice)]));
    let resolver = AuthorizationResolver::new(node.clone());
    let vault = vault_with(&[&alice]);

    let overweight = Transaction::new(vec![Operation::Vote {
        voter: "alice".into(),
        author: "author".into(),
        permlink: "post".into(),
        weight: 10_001,
    }]);
    let err = resolver
        .sign_transaction(&vault, &WalletConfig::default(), overweight, true)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Validation(_)));
    assert_eq!(node.broadcast_count(), 0);
}
