//! JSON-RPC 2.0 node client over HTTP.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::blockchain::traits::NodeClient;
use crate::core::domain::{Account, AccountName, BroadcastResult, DynamicGlobalProperties, SignedTransaction};
use crate::core::errors::WalletError;

/// HTTP JSON-RPC client for the remote full node.
#[derive(Debug, Clone)]
pub struct JsonRpcNodeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl JsonRpcNodeClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), endpoint: endpoint.into() }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, WalletError> {
        debug!(method, "node rpc call");
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::Remote(format!("{method}: {e}")))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| WalletError::Remote(format!("{method}: malformed response: {e}")))?;

        if let Some(error) = body.get("error") {
            return Err(WalletError::Remote(format!("{method}: {error}")));
        }
        let result = body
            .get("result")
            .cloned()
            .ok_or_else(|| WalletError::Remote(format!("{method}: response missing result")))?;
        serde_json::from_value(result)
            .map_err(|e| WalletError::Remote(format!("{method}: unexpected result shape: {e}")))
    }
}

#[async_trait]
impl NodeClient for JsonRpcNodeClient {
    async fn get_accounts(&self, names: &[AccountName]) -> Result<Vec<Option<Account>>, WalletError> {
        self.call("get_accounts", json!([names])).await
    }

    async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, WalletError> {
        self.call("get_dynamic_global_properties", json!([])).await
    }

    async fn broadcast_transaction_synchronous(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<BroadcastResult, WalletError> {
        self.call("broadcast_transaction_synchronous", json!([transaction])).await
    }
}
