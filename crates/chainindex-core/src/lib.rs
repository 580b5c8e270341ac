//! chainindex-core — the chain-agnostic domain types and traits the
//! ingestion engine is built from.
//!
//! # Architecture
//!
//! ```text
//! Builder (chainindex-engine) ──┬── Database  (chainindex-storage)
//!                                ├── Node      (chainindex-node-cosmos / chainindex-node-evm)
//!                                └── Module    (BlockHandler / TxHandler, user-supplied)
//! ```
//!
//! This crate defines the shapes those pieces agree on — [`Block`]/[`Tx`],
//! [`config::Config`], the [`error::IndexerError`] hierarchy, and the
//! [`Node`]/[`Database`]/module traits — but contains no engine loop and
//! no chain-specific fetch logic itself.

pub mod block;
pub mod cancel;
pub mod config;
pub mod database;
pub mod error;
pub mod height;
pub mod module;
pub mod node;

pub use block::{
    Block, BlockVariant, CosmosBlockData, CosmosEvent, CosmosEventAttribute, CosmosTxData,
    EvmBlockData, EvmLog, EvmTxData, Tx, TxVariant,
};
pub use cancel::CancellationToken;
pub use config::{Config, IndexerConfig, LoggingConfig, MonitoringConfig, RawConfig};
pub use database::Database;
pub use error::{
    BuilderError, ConfigError, DatabaseError, IndexerError, ModuleError, PermanentNodeError,
    TransientNodeError,
};
pub use height::{Height, IndexerHeight, MAX_HEIGHT};
pub use module::{BlockHandler, GlobalObjects, GlobalObjectsBuilder, Module, TxHandler};
pub use node::{binary_search_lowest_height, Node};
