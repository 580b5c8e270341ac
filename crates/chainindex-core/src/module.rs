//! The module system: user-supplied handlers over blocks and
//! transactions, keyed by name and constructed once per indexer.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::block::{Block, CosmosBlockData, CosmosTxData, EvmBlockData, EvmTxData, Tx};
use crate::cancel::CancellationToken;
use crate::error::IndexerError;

#[async_trait]
pub trait BlockHandler: Send + Sync {
    async fn handle_block(&self, token: &CancellationToken, block: &Block) -> Result<(), IndexerError>;
}

#[async_trait]
pub trait TxHandler: Send + Sync {
    async fn handle_tx(
        &self,
        token: &CancellationToken,
        block: &Block,
        tx: &Tx,
    ) -> Result<(), IndexerError>;
}

/// A block handler scoped to a single chain's payload type. Modules
/// written against one chain implement this instead of [`BlockHandler`]
/// directly, and go through [`CosmosBlockAdapter`]/[`EvmBlockAdapter`] to
/// become chain-agnostic.
#[async_trait]
pub trait CosmosBlockHandler: Send + Sync {
    async fn handle_cosmos_block(
        &self,
        token: &CancellationToken,
        block: &Block,
        data: &CosmosBlockData,
    ) -> Result<(), IndexerError>;
}

#[async_trait]
pub trait EvmBlockHandler: Send + Sync {
    async fn handle_evm_block(
        &self,
        token: &CancellationToken,
        block: &Block,
        data: &EvmBlockData,
    ) -> Result<(), IndexerError>;
}

/// A tx handler scoped to a single chain's payload type. See
/// [`CosmosBlockHandler`].
#[async_trait]
pub trait CosmosTxHandler: Send + Sync {
    async fn handle_cosmos_tx(
        &self,
        token: &CancellationToken,
        block: &Block,
        tx: &Tx,
        data: &CosmosTxData,
    ) -> Result<(), IndexerError>;
}

#[async_trait]
pub trait EvmTxHandler: Send + Sync {
    async fn handle_evm_tx(
        &self,
        token: &CancellationToken,
        block: &Block,
        tx: &Tx,
        data: &EvmTxData,
    ) -> Result<(), IndexerError>;
}

/// Wraps a [`CosmosBlockHandler`] as a [`BlockHandler`]. A block of any
/// other chain is a type mismatch, not a module error: the adapter
/// no-ops rather than invoking the inner handler, mirroring the
/// original chain SDK's module adapters.
pub struct CosmosBlockAdapter<H>(pub Arc<H>);

#[async_trait]
impl<H: CosmosBlockHandler> BlockHandler for CosmosBlockAdapter<H> {
    async fn handle_block(&self, token: &CancellationToken, block: &Block) -> Result<(), IndexerError> {
        match block.as_cosmos() {
            Some(data) => self.0.handle_cosmos_block(token, block, data).await,
            None => Ok(()),
        }
    }
}

/// Wraps an [`EvmBlockHandler`] as a [`BlockHandler`]. See [`CosmosBlockAdapter`].
pub struct EvmBlockAdapter<H>(pub Arc<H>);

#[async_trait]
impl<H: EvmBlockHandler> BlockHandler for EvmBlockAdapter<H> {
    async fn handle_block(&self, token: &CancellationToken, block: &Block) -> Result<(), IndexerError> {
        match block.as_evm() {
            Some(data) => self.0.handle_evm_block(token, block, data).await,
            None => Ok(()),
        }
    }
}

/// Wraps a [`CosmosTxHandler`] as a [`TxHandler`]. See [`CosmosBlockAdapter`].
pub struct CosmosTxAdapter<H>(pub Arc<H>);

#[async_trait]
impl<H: CosmosTxHandler> TxHandler for CosmosTxAdapter<H> {
    async fn handle_tx(&self, token: &CancellationToken, block: &Block, tx: &Tx) -> Result<(), IndexerError> {
        match tx.as_cosmos() {
            Some(data) => self.0.handle_cosmos_tx(token, block, tx, data).await,
            None => Ok(()),
        }
    }
}

/// Wraps an [`EvmTxHandler`] as a [`TxHandler`]. See [`CosmosBlockAdapter`].
pub struct EvmTxAdapter<H>(pub Arc<H>);

#[async_trait]
impl<H: EvmTxHandler> TxHandler for EvmTxAdapter<H> {
    async fn handle_tx(&self, token: &CancellationToken, block: &Block, tx: &Tx) -> Result<(), IndexerError> {
        match tx.as_evm() {
            Some(data) => self.0.handle_evm_tx(token, block, tx, data).await,
            None => Ok(()),
        }
    }
}

/// A constructed module instance. A module may implement either
/// capability, or both; the worker checks each independently (see
/// [`crate::config`] for where module names are declared).
pub struct Module {
    pub name: String,
    pub block_handler: Option<Arc<dyn BlockHandler>>,
    pub tx_handler: Option<Arc<dyn TxHandler>>,
}

impl Module {
    pub fn block_only(name: impl Into<String>, handler: Arc<dyn BlockHandler>) -> Self {
        Self {
            name: name.into(),
            block_handler: Some(handler),
            tx_handler: None,
        }
    }

    pub fn tx_only(name: impl Into<String>, handler: Arc<dyn TxHandler>) -> Self {
        Self {
            name: name.into(),
            block_handler: None,
            tx_handler: Some(handler),
        }
    }

    pub fn both(
        name: impl Into<String>,
        block_handler: Arc<dyn BlockHandler>,
        tx_handler: Arc<dyn TxHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            block_handler: Some(block_handler),
            tx_handler: Some(tx_handler),
        }
    }
}

/// Write-once-before-start bag of shared immutable inputs (e.g. codec
/// registries) handed to module factories alongside their raw config.
/// Modules pull values out by key and downcast; a missing key or a
/// type mismatch is the factory's own programming error, not a runtime
/// condition the framework guards against.
#[derive(Default, Clone)]
pub struct GlobalObjects {
    objects: Arc<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

pub struct GlobalObjectsBuilder {
    objects: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl GlobalObjectsBuilder {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }

    pub fn with_object(mut self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) -> Self {
        self.objects.insert(key.into(), value);
        self
    }

    pub fn build(self) -> GlobalObjects {
        GlobalObjects {
            objects: Arc::new(self.objects),
        }
    }
}

impl Default for GlobalObjectsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalObjects {
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.objects
            .get(key)
            .and_then(|v| v.clone().downcast::<T>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockVariant, TxVariant};
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Dummy(u32);

    #[test]
    fn global_objects_round_trip_by_key_and_type() {
        let bag = GlobalObjectsBuilder::new()
            .with_object("codec", Arc::new(Dummy(7)) as Arc<dyn Any + Send + Sync>)
            .build();
        let retrieved = bag.get::<Dummy>("codec").unwrap();
        assert_eq!(retrieved.0, 7);
        assert!(bag.get::<Dummy>("missing").is_none());
    }

    struct RecordingCosmosBlockHandler {
        invoked: AtomicBool,
    }

    #[async_trait]
    impl CosmosBlockHandler for RecordingCosmosBlockHandler {
        async fn handle_cosmos_block(
            &self,
            _token: &CancellationToken,
            _block: &Block,
            _data: &CosmosBlockData,
        ) -> Result<(), IndexerError> {
            self.invoked.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn evm_block() -> Block {
        Block {
            chain_id: "1".into(),
            height: 100,
            timestamp: Utc::now(),
            txs: vec![Tx {
                hash: "0xabc".into(),
                is_successful: true,
                variant: TxVariant::Evm(EvmTxData::default()),
            }],
            variant: BlockVariant::Evm(EvmBlockData::default()),
        }
    }

    #[tokio::test]
    async fn cosmos_adapter_noops_on_mismatched_block() {
        let handler = Arc::new(RecordingCosmosBlockHandler {
            invoked: AtomicBool::new(false),
        });
        let adapter = CosmosBlockAdapter(handler.clone());
        let token = CancellationToken::new();

        let result = adapter.handle_block(&token, &evm_block()).await;

        assert!(result.is_ok());
        assert!(!handler.invoked.load(Ordering::SeqCst));
    }
}
