//! The operation catalogue consumed by authorization resolution.
//!
//! A closed tagged union over the operation kinds this hardfork version
//! understands; every dispatch site matches exhaustively so adding a variant
//! is a compile-time event, not a runtime surprise. The full wire schema
//! lives with the node; this side carries only what resolution, validation,
//! and the canonical signing encoding need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::domain::{AccountName, Asset, Authority};
use crate::core::errors::WalletError;

/// Operation-kind set version, bumped in lockstep with the chain hardfork.
pub const HARDFORK_OPERATION_VERSION: u32 = 22;

/// Vote weight is expressed in basis points of voting power.
pub const VOTE_WEIGHT_LIMIT: i16 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Transfer {
        from: AccountName,
        to: AccountName,
        amount: Asset,
        /// Cleartext, or a `#`-prefixed encrypted envelope.
        memo: String,
    },
    AccountCreate {
        creator: AccountName,
        new_account_name: AccountName,
        fee: Asset,
        owner: Authority,
        active: Authority,
        posting: Authority,
        memo_key: crate::crypto::keys::PublicKey,
    },
    AccountUpdate {
        account: AccountName,
        owner: Option<Authority>,
        active: Option<Authority>,
        posting: Option<Authority>,
        memo_key: Option<crate::crypto::keys::PublicKey>,
    },
    Vote {
        voter: AccountName,
        author: AccountName,
        permlink: String,
        weight: i16,
    },
    WitnessProxy {
        account: AccountName,
        proxy: AccountName,
    },
    Custom {
        required_auths: Vec<AccountName>,
        id: u16,
        data: Vec<u8>,
    },
    ProposalCreate {
        author: AccountName,
        title: String,
        memo: String,
        #[serde(with = "chrono::serde::ts_seconds")]
        expiration_time: DateTime<Utc>,
        proposed_operations: Vec<Operation>,
        #[serde(with = "chrono::serde::ts_seconds_option")]
        review_period_time: Option<DateTime<Utc>>,
    },
}

/// Accounts whose authorities must approve a transaction, grouped by role,
/// plus authorities embedded directly in operations.
#[derive(Debug, Default, Clone)]
pub struct RequiredAuthorities {
    pub owner: BTreeSet<AccountName>,
    pub active: BTreeSet<AccountName>,
    pub posting: BTreeSet<AccountName>,
    pub other: Vec<Authority>,
}

impl Operation {
    /// Declares which authorities this operation needs. Pure: versioned with
    /// the operation-kind set, no chain state consulted.
    pub fn required_authorities(&self, out: &mut RequiredAuthorities) {
        match self {
            Operation::Transfer { from, .. } => {
                out.active.insert(from.clone());
            }
            Operation::AccountCreate { creator, .. } => {
                out.active.insert(creator.clone());
            }
            Operation::AccountUpdate { account, owner, .. } => {
                // Rotating the owner authority itself takes owner approval;
                // everything else on the account is an active-level change.
                if owner.is_some() {
                    out.owner.insert(account.clone());
                } else {
                    out.active.insert(account.clone());
                }
            }
            Operation::Vote { voter, .. } => {
                out.posting.insert(voter.clone());
            }
            Operation::WitnessProxy { account, .. } => {
                out.active.insert(account.clone());
            }
            Operation::Custom { required_auths, .. } => {
                for name in required_auths {
                    out.active.insert(name.clone());
                }
            }
            Operation::ProposalCreate { author, .. } => {
                out.active.insert(author.clone());
            }
        }
    }

    /// Local well-formedness checks, run before a transaction is signed.
    pub fn validate(&self) -> Result<(), WalletError> {
        match self {
            Operation::Transfer { from, to, amount, .. } => {
                require_name(from)?;
                require_name(to)?;
                if amount.amount == 0 {
                    return Err(WalletError::Validation("transfer amount must be positive".into()));
                }
                Ok(())
            }
            Operation::AccountCreate { creator, new_account_name, owner, active, posting, .. } => {
                require_name(creator)?;
                require_name(new_account_name)?;
                owner.validate()?;
                active.validate()?;
                posting.validate()?;
                Ok(())
            }
            Operation::AccountUpdate { account, owner, active, posting, .. } => {
                require_name(account)?;
                for authority in [owner, active, posting].into_iter().flatten() {
                    authority.validate()?;
                }
                Ok(())
            }
            Operation::Vote { voter, author, permlink, weight } => {
                require_name(voter)?;
                require_name(author)?;
                if permlink.is_empty() {
                    return Err(WalletError::Validation("vote permlink must not be empty".into()));
                }
                if weight.unsigned_abs() > VOTE_WEIGHT_LIMIT.unsigned_abs() {
                    return Err(WalletError::Validation(format!(
                        "vote weight {weight} outside ±{VOTE_WEIGHT_LIMIT}"
                    )));
                }
                Ok(())
            }
            Operation::WitnessProxy { account, .. } => require_name(account),
            Operation::Custom { required_auths, .. } => {
                if required_auths.is_empty() {
                    return Err(WalletError::Validation(
                        "custom operation needs at least one authorizing account".into(),
                    ));
                }
                required_auths.iter().try_for_each(|name| require_name(name))
            }
            Operation::ProposalCreate { author, title, proposed_operations, .. } => {
                require_name(author)?;
                if title.is_empty() {
                    return Err(WalletError::Validation("proposal title must not be empty".into()));
                }
                if proposed_operations.is_empty() {
                    return Err(WalletError::Validation("proposal has no operations".into()));
                }
                proposed_operations.iter().try_for_each(|op| op.validate())
            }
        }
    }
}

fn require_name(name: &str) -> Result<(), WalletError> {
    if name.is_empty() {
        return Err(WalletError::Validation("account name must not be empty".into()));
    }
    Ok(())
}

/// Collects required approvals across a whole operation list, de-duplicating
/// account names per role. Account-level delegations inside embedded
/// authorities are folded into the active set.
pub fn required_authorities(operations: &[Operation]) -> RequiredAuthorities {
    let mut out = RequiredAuthorities::default();
    for op in operations {
        op.required_authorities(&mut out);
    }
    let delegated: Vec<AccountName> = out
        .other
        .iter()
        .flat_map(|auth| auth.account_auths.iter().map(|(name, _)| name.clone()))
        .collect();
    for name in delegated {
        out.active.insert(name);
    }
    out
}
