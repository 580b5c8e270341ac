//! The Tendermint/CometBFT JSON-RPC [`Node`] implementation: `status` for
//! chain id and sync info, `block` + `block_results` merged into a
//! [`chainindex_core::Block`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use chainindex_core::{
    binary_search_lowest_height, Block, BlockVariant, CancellationToken, CosmosBlockData,
    CosmosTxData, Height, IndexerError, Node, PermanentNodeError, TransientNodeError, Tx,
    TxVariant,
};
use chainindex_rpc::request::JsonRpcRequest;
use chainindex_rpc::transport::RpcTransport;

use crate::config::Config;
use crate::events::{decode_events, parse_events_from_tx_log, split_finalize_block_events, to_core_events};
use crate::hasher::{Sha256Hasher, TxHasher};
use crate::wire::{BlockParams, BlockResult, BlockResultsParams, BlockResultsResult, StatusParams, StatusResult};

/// A Tendermint-compatible RPC node. `chain_id` is resolved once at
/// construction from `status.node_info.network` and never re-queried.
pub struct CosmosNode {
    config: Config,
    transport: Arc<dyn RpcTransport>,
    chain_id: String,
    hasher: Arc<dyn TxHasher>,
}

impl CosmosNode {
    pub async fn connect(config: Config, transport: Arc<dyn RpcTransport>) -> Result<Self, IndexerError> {
        Self::connect_with_hasher(config, transport, Arc::new(Sha256Hasher)).await
    }

    pub async fn connect_with_hasher(
        config: Config,
        transport: Arc<dyn RpcTransport>,
        hasher: Arc<dyn TxHasher>,
    ) -> Result<Self, IndexerError> {
        let status = call::<StatusResult>(&transport, "status", StatusParams {}).await?;
        Ok(Self {
            config,
            transport,
            chain_id: status.node_info.network,
            hasher,
        })
    }

    async fn status(&self) -> Result<StatusResult, IndexerError> {
        call(&self.transport, "status", StatusParams {}).await
    }
}

async fn call<T: serde::de::DeserializeOwned>(
    transport: &Arc<dyn RpcTransport>,
    method: &str,
    params: impl serde::Serialize,
) -> Result<T, IndexerError> {
    let value = serde_json::to_value(params)
        .map_err(|source| TransientNodeError::Decode { method: method.into(), source })?;
    let request = JsonRpcRequest::new(1, method, vec![value]);
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

#[async_trait]
impl Node for CosmosNode {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn current_height(&self, _token: &CancellationToken) -> Result<Height, IndexerError> {
        Ok(self.status().await?.sync_info.latest_block_height)
    }

    /// Consults the node-reported earliest height directly rather than
    /// the generic probe-and-binary-search; the node already knows its
    /// own pruning horizon when it reports a non-zero value.
    async fn lowest_height(&self, token: &CancellationToken) -> Result<Height, IndexerError> {
        let status = self.status().await?;
        if status.sync_info.earliest_block_height > 0 {
            return Ok(status.sync_info.earliest_block_height);
        }
        binary_search_lowest_height(token, status.sync_info.latest_block_height, |h| async move {
            Ok(self.fetch_block(h).await.is_ok())
        })
        .await
    }

    async fn block(&self, _token: &CancellationToken, height: Height) -> Result<Block, IndexerError> {
        self.fetch_and_build_block(height).await
    }
}

impl CosmosNode {
    async fn fetch_block(&self, height: Height) -> Result<BlockResult, IndexerError> {
        call(&self.transport, "block", BlockParams { height: Some(height) }).await
    }

    async fn fetch_and_build_block(&self, height: Height) -> Result<Block, IndexerError> {
        let block: BlockResult = self.fetch_block(height).await?;
        let mut results: BlockResultsResult =
            call(&self.transport, "block_results", BlockResultsParams { height: Some(height) }).await?;

        if block.block.data.txs.len() != results.txs_results.len() {
            return Err(PermanentNodeError::Malformed {
                method: "block_results".into(),
                reason: format!(
                    "{} raw txs but {} tx results",
                    block.block.data.txs.len(),
                    results.txs_results.len()
                ),
            }
            .into());
        }

        let use_log_mode = height <= self.config.tx_events_from_log_until_height;
        let decode_attrs = height <= self.config.decode_block_event_attributes_until_height;

        let mut txs = Vec::with_capacity(results.txs_results.len());
        for (raw_tx_b64, tx_result) in block.block.data.txs.into_iter().zip(results.txs_results.into_iter()) {
            let raw_tx = BASE64.decode(&raw_tx_b64).map_err(|e| PermanentNodeError::Malformed {
                method: "block".into(),
                reason: format!("tx is not valid base64: {e}"),
            })?;

            let events = if use_log_mode && tx_result.code == 0 {
                parse_events_from_tx_log(&tx_result.log).map_err(|e| PermanentNodeError::Malformed {
                    method: "block_results".into(),
                    reason: format!("tx.log at height {height}: {e}"),
                })?
            } else {
                to_core_events(tx_result.events)
            };

            txs.push(Tx {
                hash: self.hasher.hash(&raw_tx),
                is_successful: tx_result.code == 0,
                variant: TxVariant::Cosmos(CosmosTxData { events }),
            });
        }

        let mut begin_events = to_core_events(results.begin_block_events);
        let mut end_events = to_core_events(results.end_block_events);
        let finalize_events = to_core_events(results.finalize_block_events);

        let (begin_events, end_events, finalize_events) = if decode_attrs {
            (
                decode_events(begin_events).map_err(decode_err("begin_block_events", height))?,
                decode_events(end_events).map_err(decode_err("end_block_events", height))?,
                decode_events(finalize_events).map_err(decode_err("finalize_block_events", height))?,
            )
        } else {
            (begin_events, end_events, finalize_events)
        };

        if !finalize_events.is_empty() {
            let (split_begin, split_end) = split_finalize_block_events(&finalize_events);
            begin_events = {
                let mut combined = begin_events;
                combined.extend(split_begin);
                combined
            };
            end_events = {
                let mut combined = end_events;
                combined.extend(split_end);
                combined
            };
        }

        Ok(Block {
            chain_id: block.block.header.chain_id,
            height: block.block.header.height,
            timestamp: block.block.header.time,
            txs,
            variant: BlockVariant::Cosmos(CosmosBlockData {
                begin_block_events: begin_events,
                end_block_events: end_events,
            }),
        })
    }
}

fn decode_err(context: &'static str, height: Height) -> impl Fn(base64::DecodeError) -> IndexerError {
    move |e| {
        PermanentNodeError::Malformed {
            method: "block_results".into(),
            reason: format!("{context} at height {height}: {e}"),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainindex_rpc::request::JsonRpcResponse;
    use chainindex_rpc::transport::HealthStatus;
    use std::sync::Mutex;

    struct StubTransport {
        responses: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl RpcTransport for StubTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, chainindex_rpc::error::TransportError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("no stubbed response left for {}", req.method);
            }
            let result = responses.remove(0);
            Ok(JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: req.id,
                result: Some(result),
                error: None,
            })
        }

        fn health(&self) -> HealthStatus {
            HealthStatus::Healthy
        }

        fn url(&self) -> &str {
            "stub://node"
        }
    }

    fn status_json(latest: u64, earliest: u64) -> serde_json::Value {
        serde_json::json!({
            "node_info": {"network": "chain-a"},
            "sync_info": {
                "latest_block_height": latest.to_string(),
                "earliest_block_height": earliest.to_string(),
            }
        })
    }

    fn test_config() -> Config {
        Config {
            url: "http://localhost:26657".into(),
            request_timeout: chainindex_core::config::DurationConfig(std::time::Duration::from_secs(10)),
            tx_events_from_log_until_height: 0,
            decode_block_event_attributes_until_height: 0,
        }
    }

    #[tokio::test]
    async fn connect_resolves_chain_id_from_status() {
        let transport: Arc<dyn RpcTransport> = Arc::new(StubTransport {
            responses: Mutex::new(vec![status_json(100, 10)]),
        });
        let node = CosmosNode::connect(test_config(), transport).await.unwrap();
        assert_eq!(node.chain_id(), "chain-a");
    }

    #[tokio::test]
    async fn lowest_height_uses_node_reported_earliest_height_fast_path() {
        let transport: Arc<dyn RpcTransport> = Arc::new(StubTransport {
            responses: Mutex::new(vec![status_json(100, 10), status_json(100, 10)]),
        });
        let node = CosmosNode::connect(test_config(), transport).await.unwrap();
        let token = CancellationToken::new();
        assert_eq!(node.lowest_height(&token).await.unwrap(), 10);
    }

    fn block_json(chain_id: &str, height: u64, raw_txs: Vec<&str>) -> serde_json::Value {
        serde_json::json!({
            "header": {"chain_id": chain_id, "height": height.to_string(), "time": "2024-01-01T00:00:00Z"},
            "data": {"txs": raw_txs}
        })
    }

    #[tokio::test]
    async fn block_merges_block_and_block_results_into_one_tx_per_raw_tx() {
        let raw_tx = BASE64.encode(b"tx-bytes");
        let transport: Arc<dyn RpcTransport> = Arc::new(StubTransport {
            responses: Mutex::new(vec![
                status_json(100, 10),
                serde_json::json!({"block": block_json("chain-a", 42, vec![raw_tx.as_str()])}),
                serde_json::json!({
                    "txs_results": [{"code": 0, "log": "", "events": [{"type": "transfer", "attributes": []}]}],
                    "begin_block_events": [],
                    "end_block_events": [],
                    "finalize_block_events": [],
                }),
            ]),
        });
        let node = CosmosNode::connect(test_config(), transport).await.unwrap();
        let token = CancellationToken::new();
        let block = node.block(&token, 42).await.unwrap();
        assert_eq!(block.height, 42);
        assert_eq!(block.txs.len(), 1);
        assert!(block.txs[0].is_successful);
        assert_eq!(block.txs[0].hash.len(), 64);
    }

    #[tokio::test]
    async fn finalize_block_events_split_into_begin_and_end_by_mode_attribute() {
        let transport: Arc<dyn RpcTransport> = Arc::new(StubTransport {
            responses: Mutex::new(vec![
                status_json(100, 10),
                serde_json::json!({"block": block_json("chain-a", 7, vec![])}),
                serde_json::json!({
                    "txs_results": [],
                    "begin_block_events": [],
                    "end_block_events": [],
                    "finalize_block_events": [
                        {"type": "mint", "attributes": [{"key": "mode", "value": "BeginBlock"}]},
                        {"type": "distribution", "attributes": [{"key": "mode", "value": "EndBlock"}]},
                    ],
                }),
            ]),
        });
        let node = CosmosNode::connect(test_config(), transport).await.unwrap();
        let token = CancellationToken::new();
        let block = node.block(&token, 7).await.unwrap();
        let cosmos = block.as_cosmos().unwrap();
        assert_eq!(cosmos.begin_block_events.len(), 1);
        assert_eq!(cosmos.end_block_events.len(), 1);
        assert_eq!(cosmos.begin_block_events[0].kind, "mint");
        assert_eq!(cosmos.end_block_events[0].kind, "distribution");
    }
}
