//! The Ethereum JSON-RPC [`Node`] implementation: `eth_chainId` for the
//! chain id, `eth_getBlockByNumber` for the header, and
//! `eth_getBlockReceipts` (falling back to `eth_getLogs` when the node
//! rejects that method) for the per-transaction receipts and logs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use chainindex_core::{
    binary_search_lowest_height, Block, BlockVariant, CancellationToken, EvmBlockData, EvmLog,
    EvmTxData, Height, IndexerError, Node, PermanentNodeError, TransientNodeError, Tx, TxVariant,
};
use chainindex_rpc::request::JsonRpcRequest;
use chainindex_rpc::transport::RpcTransport;

use crate::config::Config;
use crate::wire::{parse_hex_u64, to_hex_height, BlockWire, LogWire, ReceiptWire};

/// Method codes a node uses to say "I don't implement this RPC" rather
/// than "that call failed". `eth_getBlockReceipts` is young enough that
/// plenty of nodes still answer one of these instead of a receipt list.
fn is_unsupported_method(code: i64) -> bool {
    matches!(code, -32601 | -32004)
}

/// An Ethereum-compatible JSON-RPC node. `chain_id` is resolved once at
/// construction from `eth_chainId` and never re-queried.
pub struct EvmNode {
    transport: Arc<dyn RpcTransport>,
    chain_id: String,
}

impl EvmNode {
    pub async fn connect(_config: Config, transport: Arc<dyn RpcTransport>) -> Result<Self, IndexerError> {
        let hex_chain_id: String = call(&transport, "eth_chainId", vec![]).await?;
        Ok(Self {
            transport,
            chain_id: parse_hex_u64(&hex_chain_id).to_string(),
        })
    }
}

async fn call<T: serde::de::DeserializeOwned>(
    transport: &Arc<dyn RpcTransport>,
    method: &str,
    params: Vec<serde_json::Value>,
) -> Result<T, IndexerError> {
    let request = JsonRpcRequest::new(1, method, params);
    let response = transport.send(request).await.map_err(|err| match err {
        chainindex_rpc::error::TransportError::Rpc(e) => IndexerError::TransientNode(TransientNodeError::Rpc {
            method: method.to_string(),
            code: e.code,
            message: e.message,
        }),
        other => IndexerError::TransientNode(TransientNodeError::ServerError {
            method: method.to_string(),
            status: match other {
                chainindex_rpc::error::TransportError::Timeout { .. } => 504,
                _ => 502,
            },
        }),
    })?;
    let result = response
        .into_result()
        .map_err(|e| TransientNodeError::Rpc { method: method.to_string(), code: e.code, message: e.message })?;
    serde_json::from_value(result).map_err(|source| TransientNodeError::Decode { method: method.into(), source }.into())
}

fn timestamp_from_hex(hex: &str) -> Result<DateTime<Utc>, IndexerError> {
    let secs = parse_hex_u64(hex) as i64;
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        PermanentNodeError::Malformed {
            method: "eth_getBlockByNumber".into(),
            reason: format!("timestamp {hex} is out of range"),
        }
        .into()
    })
}

fn to_core_log(log: LogWire) -> EvmLog {
    EvmLog {
        address: log.address,
        topics: log.topics,
        data: log.data,
        log_index: parse_hex_u64(&log.log_index),
        removed: log.removed.unwrap_or(false),
    }
}

#[async_trait]
impl Node for EvmNode {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn current_height(&self, _token: &CancellationToken) -> Result<Height, IndexerError> {
        let hex: String = call(&self.transport, "eth_blockNumber", vec![]).await?;
        Ok(parse_hex_u64(&hex))
    }

    async fn lowest_height(&self, token: &CancellationToken) -> Result<Height, IndexerError> {
        let current = self.current_height(token).await?;
        binary_search_lowest_height(token, current, |h| async move { Ok(self.fetch_block(h).await.is_ok()) }).await
    }

    async fn block(&self, _token: &CancellationToken, height: Height) -> Result<Block, IndexerError> {
        self.fetch_and_build_block(height).await
    }
}

impl EvmNode {
    async fn fetch_block(&self, height: Height) -> Result<BlockWire, IndexerError> {
        let hex_height = to_hex_height(height);
        let block: Option<BlockWire> =
            call(&self.transport, "eth_getBlockByNumber", vec![json!(hex_height), json!(false)]).await?;
        block.ok_or(PermanentNodeError::NotAvailable { height }.into())
    }

    async fn fetch_receipts(&self, hex_height: &str) -> Result<Vec<ReceiptWire>, IndexerError> {
        match call::<Vec<ReceiptWire>>(&self.transport, "eth_getBlockReceipts", vec![json!(hex_height)]).await {
            Ok(receipts) => Ok(receipts),
            Err(IndexerError::TransientNode(TransientNodeError::Rpc { code, .. })) if is_unsupported_method(code) => {
                self.receipts_from_logs(hex_height).await
            }
            Err(e) => Err(e),
        }
    }

    /// Reconstructs one synthetic receipt per transaction hash seen in
    /// `eth_getLogs`. Transactions that emitted no logs are invisible
    /// here and never surface as a `Tx` — the tradeoff a node that
    /// can't answer `eth_getBlockReceipts` forces on us.
    async fn receipts_from_logs(&self, hex_height: &str) -> Result<Vec<ReceiptWire>, IndexerError> {
        let filter = json!({"fromBlock": hex_height, "toBlock": hex_height});
        let logs: Vec<LogWire> = call(&self.transport, "eth_getLogs", vec![filter]).await?;

        let mut order = Vec::new();
        let mut grouped: HashMap<String, Vec<LogWire>> = HashMap::new();
        for log in logs {
            let tx_hash = log.transaction_hash.clone().unwrap_or_default();
            if !grouped.contains_key(&tx_hash) {
                order.push(tx_hash.clone());
            }
            grouped.entry(tx_hash).or_default().push(log);
        }

        Ok(order
            .into_iter()
            .map(|tx_hash| ReceiptWire {
                logs: grouped.remove(&tx_hash).unwrap_or_default(),
                status: None,
                transaction_hash: tx_hash,
            })
            .collect())
    }

    async fn fetch_and_build_block(&self, height: Height) -> Result<Block, IndexerError> {
        let hex_height = to_hex_height(height);
        let block = self.fetch_block(height).await?;
        let receipts = self.fetch_receipts(&hex_height).await?;

        let mut txs = Vec::with_capacity(receipts.len());
        let mut all_logs = Vec::new();
        for receipt in receipts {
            let is_successful = receipt
                .status
                .as_deref()
                .map(|s| parse_hex_u64(s) == 1)
                .unwrap_or(true);
            let logs: Vec<EvmLog> = receipt.logs.into_iter().map(to_core_log).collect();
            all_logs.extend(logs.iter().cloned());
            txs.push(Tx {
                hash: receipt.transaction_hash,
                is_successful,
                variant: TxVariant::Evm(EvmTxData { logs }),
            });
        }

        Ok(Block {
            chain_id: self.chain_id.clone(),
            height,
            timestamp: timestamp_from_hex(&block.timestamp)?,
            txs,
            variant: BlockVariant::Evm(EvmBlockData { logs: all_logs }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainindex_rpc::request::JsonRpcResponse;
    use chainindex_rpc::transport::HealthStatus;
    use std::sync::Mutex;

    enum Canned {
        Result(serde_json::Value),
        Error { code: i64, message: &'static str },
    }

    struct StubTransport {
        responses: Mutex<Vec<Canned>>,
    }

    #[async_trait]
    impl RpcTransport for StubTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, chainindex_rpc::error::TransportError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("no stubbed response left for {}", req.method);
            }
            match responses.remove(0) {
                Canned::Result(result) => Ok(JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: req.id,
                    result: Some(result),
                    error: None,
                }),
                Canned::Error { code, message } => Ok(JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: req.id,
                    result: None,
                    error: Some(chainindex_rpc::request::JsonRpcError {
                        code,
                        message: message.to_string(),
                        data: None,
                    }),
                }),
            }
        }

        fn health(&self) -> HealthStatus {
            HealthStatus::Healthy
        }

        fn url(&self) -> &str {
            "stub://node"
        }
    }

    fn stub(responses: Vec<Canned>) -> Arc<dyn RpcTransport> {
        Arc::new(StubTransport { responses: Mutex::new(responses) })
    }

    fn block_json(number: u64, parent: &str, timestamp: u64) -> serde_json::Value {
        json!({
            "hash": "0xblock",
            "number": to_hex_height(number),
            "parentHash": parent,
            "timestamp": to_hex_height(timestamp),
            "transactions": [],
        })
    }

    #[tokio::test]
    async fn connect_resolves_chain_id_from_hex() {
        let transport = stub(vec![Canned::Result(json!("0x1"))]);
        let node = EvmNode::connect(Config { url: "http://x".into(), request_timeout: chainindex_core::config::DurationConfig(std::time::Duration::from_secs(10)) }, transport)
            .await
            .unwrap();
        assert_eq!(node.chain_id(), "1");
    }

    #[tokio::test]
    async fn current_height_parses_hex_block_number() {
        let transport = stub(vec![Canned::Result(json!("0x1")), Canned::Result(json!("0x2a"))]);
        let node = EvmNode::connect(Config { url: "http://x".into(), request_timeout: chainindex_core::config::DurationConfig(std::time::Duration::from_secs(10)) }, transport)
            .await
            .unwrap();
        let token = CancellationToken::new();
        assert_eq!(node.current_height(&token).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn block_builds_one_tx_per_receipt_with_attached_and_flattened_logs() {
        let transport = stub(vec![
            Canned::Result(json!("0x1")),
            Canned::Result(block_json(10, "0xparent", 1_700_000_000)),
            Canned::Result(json!([
                {
                    "transactionHash": "0xabc",
                    "status": "0x1",
                    "logs": [{"address": "0xc0ffee", "topics": ["0xt1"], "data": "0xdead", "logIndex": "0x0"}],
                },
            ])),
        ]);
        let node = EvmNode::connect(Config { url: "http://x".into(), request_timeout: chainindex_core::config::DurationConfig(std::time::Duration::from_secs(10)) }, transport)
            .await
            .unwrap();
        let token = CancellationToken::new();
        let block = node.block(&token, 10).await.unwrap();
        assert_eq!(block.txs.len(), 1);
        assert!(block.txs[0].is_successful);
        assert_eq!(block.txs[0].as_evm().unwrap().logs.len(), 1);
        assert_eq!(block.as_evm().unwrap().logs.len(), 1);
    }

    #[tokio::test]
    async fn block_falls_back_to_get_logs_when_receipts_unsupported() {
        let transport = stub(vec![
            Canned::Result(json!("0x1")),
            Canned::Result(block_json(11, "0xparent", 1_700_000_000)),
            Canned::Error { code: -32601, message: "method not found" },
            Canned::Result(json!([
                {"address": "0xc0ffee", "topics": [], "data": "0x", "logIndex": "0x0", "transactionHash": "0xabc"},
                {"address": "0xc0ffee", "topics": [], "data": "0x", "logIndex": "0x1", "transactionHash": "0xabc"},
            ])),
        ]);
        let node = EvmNode::connect(Config { url: "http://x".into(), request_timeout: chainindex_core::config::DurationConfig(std::time::Duration::from_secs(10)) }, transport)
            .await
            .unwrap();
        let token = CancellationToken::new();
        let block = node.block(&token, 11).await.unwrap();
        assert_eq!(block.txs.len(), 1);
        assert!(block.txs[0].is_successful);
        assert_eq!(block.txs[0].as_evm().unwrap().logs.len(), 2);
    }
}
