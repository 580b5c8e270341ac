//! The worker state machine (§4.7):
//! `Idle -> Dequeued -> Fetched|FetchError -> Processed|ProcessError -> Persisted|PersistError -> Idle`.

use std::sync::Arc;
use std::time::Duration;

use chainindex_core::{CancellationToken, Database, IndexerError, IndexerHeight, Module, Node};
use chainindex_queue::Queue;

#[derive(Clone)]
pub struct WorkerConfig {
    pub indexer_name: Arc<str>,
    pub chain_id: Arc<str>,
    pub max_attempts: u32,
    pub time_before_retry: Duration,
}

/// Runs until the queue is closed and drained, or cancellation fires.
/// One call = one worker task's whole lifetime.
pub async fn run_worker(
    token: CancellationToken,
    queue: Arc<Queue<IndexerHeight>>,
    node: Arc<dyn Node>,
    database: Arc<dyn Database>,
    modules: Arc<Vec<Module>>,
    config: WorkerConfig,
) {
    loop {
        let Some(item) = queue.context_dequeue(&token).await else {
            break;
        };
        process_height(&token, &queue, &node, &database, &modules, &config, item).await;
    }
}

async fn process_height(
    token: &CancellationToken,
    queue: &Arc<Queue<IndexerHeight>>,
    node: &Arc<dyn Node>,
    database: &Arc<dyn Database>,
    modules: &Arc<Vec<Module>>,
    config: &WorkerConfig,
    item: IndexerHeight,
) {
    let block = match node.block(token, item.height).await {
        Ok(block) => block,
        Err(err) => {
            tracing::warn!(
                indexer_name = %config.indexer_name,
                height = item.height,
                attempts = item.attempts,
                error = %err,
                "fetch failed"
            );
            re_enqueue(token, queue, config, item);
            return;
        }
    };

    if let Err(err) = process_block(token, &block, modules).await {
        tracing::warn!(
            indexer_name = %config.indexer_name,
            height = item.height,
            attempts = item.attempts,
            error = %err,
            "module processing failed"
        );
        re_enqueue(token, queue, config, item);
        return;
    }

    if let Err(err) = database
        .save_indexed_block(&config.indexer_name, &config.chain_id, item.height, chrono::Utc::now())
        .await
    {
        tracing::warn!(
            indexer_name = %config.indexer_name,
            height = item.height,
            attempts = item.attempts,
            error = %err,
            "persist failed"
        );
        re_enqueue(token, queue, config, IndexerHeight::with_attempts(item.height, item.attempts));
        return;
    }

    chainindex_metrics::set_latest_indexed_height(&config.indexer_name, item.height);
    tracing::debug!(indexer_name = %config.indexer_name, height = item.height, "block indexed");
}

/// Runs every module in configured order: `handle_block` if the module
/// implements it, then `handle_tx` per transaction if it also implements
/// `TxHandler`. Any module error aborts the whole block — no partial
/// persistence of this height.
async fn process_block(
    token: &CancellationToken,
    block: &chainindex_core::Block,
    modules: &Arc<Vec<Module>>,
) -> Result<(), IndexerError> {
    for module in modules.iter() {
        if let Some(handler) = &module.block_handler {
            handler.handle_block(token, block).await?;
        }
        if let Some(handler) = &module.tx_handler {
            for tx in &block.txs {
                handler.handle_tx(token, block, tx).await?;
            }
        }
    }
    Ok(())
}

fn re_enqueue(
    token: &CancellationToken,
    queue: &Arc<Queue<IndexerHeight>>,
    config: &WorkerConfig,
    item: IndexerHeight,
) {
    let attempts = item.attempts + 1;
    if attempts >= config.max_attempts {
        tracing::error!(
            indexer_name = %config.indexer_name,
            height = item.height,
            attempts,
            "max attempts exhausted; dropping block"
        );
        chainindex_metrics::increment_failed_blocks(&config.indexer_name);
        return;
    }
    Queue::spawn_delayed_enqueue(
        queue,
        token.clone(),
        config.time_before_retry,
        IndexerHeight::with_attempts(item.height, attempts),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainindex_core::{Block, BlockVariant, CosmosBlockData, DatabaseError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn test_block(height: u64) -> Block {
        Block {
            chain_id: "chain-a".into(),
            height,
            timestamp: chrono::Utc::now(),
            txs: vec![],
            variant: BlockVariant::Cosmos(CosmosBlockData {
                begin_block_events: vec![],
                end_block_events: vec![],
            }),
        }
    }

    struct FlakyNode {
        fail_until: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Node for FlakyNode {
        fn chain_id(&self) -> &str {
            "chain-a"
        }
        async fn current_height(&self, _token: &CancellationToken) -> Result<u64, IndexerError> {
            Ok(0)
        }
        async fn lowest_height(&self, _token: &CancellationToken) -> Result<u64, IndexerError> {
            Ok(0)
        }
        async fn block(&self, _token: &CancellationToken, height: u64) -> Result<Block, IndexerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_until {
                Err(IndexerError::TransientNode(
                    chainindex_core::TransientNodeError::ServerError {
                        method: "block".into(),
                        status: 500,
                    },
                ))
            } else {
                Ok(test_block(height))
            }
        }
    }

    struct RecordingDatabase {
        saved: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl Database for RecordingDatabase {
        async fn get_lowest_block(&self, _chain_id: &str) -> Result<Option<u64>, DatabaseError> {
            Ok(None)
        }
        async fn get_missing_blocks(&self, _chain_id: &str, from: u64, to: u64) -> Result<Vec<u64>, DatabaseError> {
            Ok((from..=to).collect())
        }
        async fn save_indexed_block(
            &self,
            _indexer_name: &str,
            _chain_id: &str,
            height: u64,
            _timestamp: chrono::DateTime<chrono::Utc>,
        ) -> Result<(), DatabaseError> {
            self.saved.lock().unwrap().push(height);
            Ok(())
        }
    }

    fn config(max_attempts: u32) -> WorkerConfig {
        WorkerConfig {
            indexer_name: Arc::from("idx1"),
            chain_id: Arc::from("chain-a"),
            max_attempts,
            time_before_retry: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn transient_failures_then_success_persist_exactly_once() {
        let token = CancellationToken::new();
        let queue = Arc::new(Queue::new(16));
        let node: Arc<dyn Node> = Arc::new(FlakyNode {
            fail_until: 2,
            calls: AtomicU32::new(0),
        });
        let database = Arc::new(RecordingDatabase { saved: Mutex::new(Vec::new()) });
        let modules = Arc::new(Vec::new());
        let cfg = config(5);

        queue.enqueue(IndexerHeight::new(42)).await;
        let worker_queue = queue.clone();
        let worker_token = token.clone();
        let worker_node = node.clone();
        let worker_db: Arc<dyn Database> = database.clone();
        let worker_modules = modules.clone();
        let worker_cfg = cfg.clone();
        let handle = tokio::spawn(async move {
            run_worker(worker_token, worker_queue, worker_node, worker_db, worker_modules, worker_cfg).await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        queue.close();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(*database.saved.lock().unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn max_attempts_exhaustion_drops_the_block() {
        let token = CancellationToken::new();
        let queue = Arc::new(Queue::new(16));
        let node: Arc<dyn Node> = Arc::new(FlakyNode {
            fail_until: 100,
            calls: AtomicU32::new(0),
        });
        let database = Arc::new(RecordingDatabase { saved: Mutex::new(Vec::new()) });
        let modules = Arc::new(Vec::new());
        let cfg = config(3);

        queue.enqueue(IndexerHeight::new(99)).await;
        let worker_queue = queue.clone();
        let worker_token = token.clone();
        let worker_node = node.clone();
        let worker_db: Arc<dyn Database> = database.clone();
        let worker_modules = modules.clone();
        let worker_cfg = cfg.clone();
        let handle = tokio::spawn(async move {
            run_worker(worker_token, worker_queue, worker_node, worker_db, worker_modules, worker_cfg).await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        queue.close();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert!(database.saved.lock().unwrap().is_empty());
    }
}
