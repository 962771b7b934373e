//! JSON-RPC chain clients

use crate::chains::{DestinationChain, ExecutionReceipt, SourceChain, TransferInitiated};
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use giro_primitives::{Address, H256, U256};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal JSON-RPC 2.0 client over HTTP.
///
/// Transport failures classify as transient; RPC error objects classify by
/// their message through the shared taxonomy.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

impl JsonRpcClient {
    /// Create a client for the endpoint
    pub fn new(url: impl Into<String>) -> RelayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Permanent(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one RPC call
    pub async fn call(&self, method: &str, params: Value) -> RelayResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest)?;

        if response.status().as_u16() == 429 {
            return Err(RelayError::Transient("rate limit".into()));
        }
        if !response.status().is_success() {
            return Err(RelayError::classify(&format!(
                "http status {}",
                response.status()
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Transient(format!("malformed response: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(RelayError::classify(&err.message));
        }
        parsed
            .result
            .ok_or_else(|| RelayError::Transient("response missing result".into()))
    }
}

fn classify_reqwest(err: reqwest::Error) -> RelayError {
    if err.is_timeout() || err.is_connect() {
        RelayError::Transient(err.to_string())
    } else {
        RelayError::classify(&err.to_string())
    }
}

/// Transfer event as source adapters report it
#[derive(Deserialize)]
struct RpcTransfer {
    tx_hash: String,
    sender: String,
    recipient: String,
    /// Decimal base-unit amount
    amount: String,
    dest_chain: String,
    nonce: u64,
    block_height: u64,
    timestamp: u64,
}

impl RpcTransfer {
    fn into_initiated(self) -> RelayResult<TransferInitiated> {
        Ok(TransferInitiated {
            tx_hash: H256::from_hex(&self.tx_hash)
                .map_err(|e| RelayError::Permanent(format!("tx_hash: {e}")))?,
            sender: self.sender,
            recipient: Address::from_hex(&self.recipient)
                .map_err(|e| RelayError::Permanent(format!("recipient: {e}")))?,
            amount: U256::from_dec_str(&self.amount)
                .map_err(|e| RelayError::Permanent(format!("amount: {e}")))?,
            dest_chain: self.dest_chain,
            nonce: self.nonce,
            block_height: self.block_height,
            timestamp: self.timestamp,
        })
    }
}

/// Source ledger behind a JSON-RPC adapter
pub struct HttpSourceChain {
    rpc: JsonRpcClient,
    chain_id: String,
}

impl HttpSourceChain {
    /// Create a client for the named chain
    pub fn new(chain_id: impl Into<String>, url: impl Into<String>) -> RelayResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
            chain_id: chain_id.into(),
        })
    }
}

#[async_trait]
impl SourceChain for HttpSourceChain {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn latest_block(&self) -> RelayResult<u64> {
        let value = self.rpc.call("transfer_latestBlock", json!([])).await?;
        serde_json::from_value(value)
            .map_err(|e| RelayError::Transient(format!("latest block: {e}")))
    }

    async fn fetch_events(&self, from: u64, to: u64) -> RelayResult<Vec<TransferInitiated>> {
        let value = self
            .rpc
            .call("transfer_getEvents", json!([from, to]))
            .await?;
        let transfers: Vec<RpcTransfer> = serde_json::from_value(value)
            .map_err(|e| RelayError::Transient(format!("events: {e}")))?;
        transfers.into_iter().map(RpcTransfer::into_initiated).collect()
    }
}

#[derive(Deserialize)]
struct RpcReceipt {
    tx_hash: String,
    block_height: u64,
}

/// Destination ledger behind a JSON-RPC adapter
pub struct HttpDestinationChain {
    rpc: JsonRpcClient,
    chain_id: String,
}

impl HttpDestinationChain {
    /// Create a client for the named chain
    pub fn new(chain_id: impl Into<String>, url: impl Into<String>) -> RelayResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
            chain_id: chain_id.into(),
        })
    }
}

#[async_trait]
impl DestinationChain for HttpDestinationChain {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn execute_mint(
        &self,
        command_id: H256,
        recipient: Address,
        amount: U256,
        signatures: Vec<[u8; 65]>,
    ) -> RelayResult<ExecutionReceipt> {
        let params = json!([{
            "command_id": command_id.to_hex(),
            "recipient": recipient.to_hex(),
            "amount": amount.to_string(),
            "signatures": signatures.iter().map(hex::encode).collect::<Vec<_>>(),
        }]);
        let value = self.rpc.call("mint_execute", params).await?;
        let receipt: RpcReceipt = serde_json::from_value(value)
            .map_err(|e| RelayError::Transient(format!("receipt: {e}")))?;
        Ok(ExecutionReceipt {
            tx_hash: H256::from_hex(&receipt.tx_hash)
                .map_err(|e| RelayError::Permanent(format!("receipt tx: {e}")))?,
            block_height: receipt.block_height,
        })
    }
}
