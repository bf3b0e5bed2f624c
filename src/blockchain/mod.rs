pub mod authorization;
pub mod client;
pub mod sign_state;
pub mod staging;
pub mod traits;

// In-memory node double, compiled for unit tests and for integration tests
// via the `test-env` feature.
#[cfg(any(test, feature = "test-env"))]
pub mod testing;

pub use authorization::AuthorizationResolver;
pub use client::JsonRpcNodeClient;
pub use staging::{TransactionHandle, TransactionStaging};
pub use traits::NodeClient;
