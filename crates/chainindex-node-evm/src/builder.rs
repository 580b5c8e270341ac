//! Registers the `evm-rpc` node type with a [`chainindex_engine::Registry`].

use std::sync::Arc;

use async_trait::async_trait;

use chainindex_core::{BuilderError, Node};
use chainindex_engine::NodeFactory;
use chainindex_rpc::transport::RpcTransport;
use chainindex_rpc_http::{HttpClientConfig, HttpRpcClient};

use crate::config::Config;
use crate::node::EvmNode;

/// The `type:` discriminator this factory is registered under.
pub const NODE_TYPE: &str = "evm-rpc";

pub struct EvmNodeFactory;

#[async_trait]
impl NodeFactory for EvmNodeFactory {
    async fn build(&self, raw_config: &[u8]) -> Result<Arc<dyn Node>, BuilderError> {
        let config: Config = serde_yaml::from_slice(raw_config)
            .map_err(|e| BuilderError::NodeFactory {
                id: NODE_TYPE.to_string(),
                ty: NODE_TYPE.to_string(),
                reason: format!("invalid config: {e}"),
            })?;
        config.validate().map_err(|reason| BuilderError::NodeFactory {
            id: NODE_TYPE.to_string(),
            ty: NODE_TYPE.to_string(),
            reason,
        })?;

        let http_config = HttpClientConfig {
            request_timeout: config.request_timeout.0,
            ..Default::default()
        };
        let transport: Arc<dyn RpcTransport> = Arc::new(HttpRpcClient::new(config.url.clone(), http_config));

        let node = EvmNode::connect(config, transport)
            .await
            .map_err(|e| BuilderError::NodeFactory {
                id: NODE_TYPE.to_string(),
                ty: NODE_TYPE.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(node))
    }
}
