//! chainindex-node-cosmos — the Tendermint/CometBFT JSON-RPC [`Node`]
//! backend: `status`/`block`/`block_results`, tx-event extraction (log
//! or raw), block-event attribute decoding, and the begin/end split of
//! a combined `finalize_block_events` set.

pub mod builder;
pub mod config;
pub mod events;
pub mod hasher;
pub mod node;
pub mod wire;

pub use builder::{CosmosNodeFactory, NODE_TYPE};
pub use config::Config;
pub use hasher::{Sha256Hasher, TxHasher};
pub use node::CosmosNode;
