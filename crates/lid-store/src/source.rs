//! Remote ledger access.

use async_trait::async_trait;
use lid_core::{Block, LidError, Result, RpcConfig};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Where raw blocks come from when the local mirror lacks them.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Index of the newest finalized block.
    async fn tip_index(&self) -> Result<u64>;
    async fn fetch_block(&self, index: u64) -> Result<Block>;
}

/// Bitcoin-family JSON-RPC node client.
#[derive(Clone)]
pub struct RpcBlockSource {
    client: Client,
    url: String,
    user: String,
    password: String,
}

impl std::fmt::Debug for RpcBlockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcBlockSource")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcBlockSource {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LidError::Rpc(format!("build client: {e}")))?;
        Ok(Self {
            client,
            url: config.address.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest { jsonrpc: "1.0", id: "lid", method, params };
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| LidError::Rpc(format!("{method}: {e}")))?;

        // Nodes report RPC-level failures with a 500 and a JSON body.
        let status = response.status();
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LidError::Rpc(format!("{method}: HTTP {status}: {e}")))?;
        if let Some(err) = body.error {
            return Err(LidError::Rpc(format!("{method}: {} (code {})", err.message, err.code)));
        }
        let result = body
            .result
            .ok_or_else(|| LidError::Rpc(format!("{method}: empty result")))?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn block_hash(&self, index: u64) -> Result<String> {
        self.call("getblockhash", json!([index])).await
    }
}

#[async_trait]
impl BlockSource for RpcBlockSource {
    async fn tip_index(&self) -> Result<u64> {
        self.call("getblockcount", json!([])).await
    }

    async fn fetch_block(&self, index: u64) -> Result<Block> {
        let hash = self.block_hash(index).await?;
        let raw_hex: String = self.call("getblock", json!([hash, 0])).await?;
        let raw_data = hex::decode(raw_hex.trim())
            .map_err(|e| LidError::Rpc(format!("getblock {index}: invalid hex: {e}")))?;
        Ok(Block::new(index, raw_data))
    }
}

/// Fixed in-memory chain, used for offline mirrors and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticBlockSource {
    blocks: Vec<Vec<u8>>,
}

impl StaticBlockSource {
    pub fn new(blocks: Vec<Vec<u8>>) -> Self {
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[async_trait]
impl BlockSource for StaticBlockSource {
    async fn tip_index(&self) -> Result<u64> {
        match self.blocks.len() {
            0 => Err(LidError::Rpc("chain is empty".into())),
            n => Ok(n as u64 - 1),
        }
    }

    async fn fetch_block(&self, index: u64) -> Result<Block> {
        self.blocks
            .get(index as usize)
            .map(|raw| Block::new(index, raw.clone()))
            .ok_or_else(|| LidError::BlockUnavailable {
                index,
                reason: "beyond chain tip".into(),
            })
    }
}
