//! chainindex-node-evm — the Ethereum JSON-RPC [`Node`] backend:
//! `eth_chainId`/`eth_blockNumber`/`eth_getBlockByNumber`, receipts via
//! `eth_getBlockReceipts` with an `eth_getLogs` fallback, and logs
//! attached both to their owning transaction and flattened onto the
//! block.

pub mod builder;
pub mod config;
pub mod node;
pub mod wire;

pub use builder::{EvmNodeFactory, NODE_TYPE};
pub use config::Config;
pub use node::EvmNode;
