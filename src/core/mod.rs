pub mod config;
pub mod domain;
pub mod errors;
pub mod operations;
pub mod wallet;

pub use config::WalletConfig;
pub use domain::{Account, Authority, SignedTransaction, Transaction};
pub use errors::WalletError;
pub use operations::Operation;
pub use wallet::Wallet;
