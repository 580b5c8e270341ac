//! Indexer lifecycle (§4.8): binds config + node + database + modules +
//! queue, and owns the producer task and worker pool.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chainindex_core::{CancellationToken, Database, IndexerConfig, IndexerError, IndexerHeight, Module, Node};
use chainindex_queue::Queue;

use crate::gaps::compute_gaps;
use crate::producer::{CombinedProducer, HeightProducer, ListProducer, NodeProducer};
use crate::worker::{run_worker, WorkerConfig};

/// A fully constructed indexer, ready to `start`. Produced by
/// [`crate::builder::Builder`].
pub struct Indexer {
    pub name: String,
    pub node: Arc<dyn Node>,
    pub database: Arc<dyn Database>,
    pub modules: Arc<Vec<Module>>,
    pub config: IndexerConfig,
    /// An explicit height producer set by the embedder (e.g. `parse
    /// range` building a one-shot `RangeProducer`), bypassing the
    /// default `Combined(List(gaps), Node(..))` composition computed at
    /// start. `None` is the ordinary `start` path.
    pub custom_producer: Option<Arc<dyn HeightProducer>>,
}

impl Indexer {
    /// Runs the producer and worker pool until the producer terminates
    /// (queue closes, workers drain) or `token` cancels. Returns once
    /// every spawned task has exited.
    pub async fn start(self: Arc<Self>, token: CancellationToken) -> Result<(), IndexerError> {
        let queue = Arc::new(Queue::<IndexerHeight>::new(self.config.height_queue_size as usize));

        let producer: Arc<dyn HeightProducer> = match &self.custom_producer {
            Some(p) => p.clone(),
            None => self.default_producer(&token).await?,
        };

        let producer_queue = queue.clone();
        let producer_token = token.clone();
        let producer_handle = tokio::spawn(async move {
            let result = producer.enqueue_heights(&producer_token, &producer_queue).await;
            producer_queue.close();
            result
        });

        let worker_count = self.config.workers;
        chainindex_metrics::set_active_workers(&self.name, worker_count as i64);
        let remaining = Arc::new(AtomicI64::new(worker_count as i64));

        let worker_config = WorkerConfig {
            indexer_name: Arc::from(self.name.as_str()),
            chain_id: Arc::from(self.node.chain_id()),
            max_attempts: self.config.max_attempts,
            time_before_retry: self.config.time_before_retry.0,
        };

        let mut worker_handles = Vec::with_capacity(worker_count as usize);
        for _ in 0..worker_count {
            let worker_queue = queue.clone();
            let worker_token = token.clone();
            let worker_node = self.node.clone();
            let worker_db = self.database.clone();
            let worker_modules = self.modules.clone();
            let worker_cfg = worker_config.clone();
            let indexer_name = self.name.clone();
            let remaining = remaining.clone();
            worker_handles.push(tokio::spawn(async move {
                run_worker(worker_token, worker_queue, worker_node, worker_db, worker_modules, worker_cfg).await;
                let left = remaining.fetch_sub(1, Ordering::SeqCst) - 1;
                chainindex_metrics::set_active_workers(&indexer_name, left);
            }));
        }

        for handle in worker_handles {
            let _ = handle.await;
        }

        match producer_handle.await {
            Ok(result) => result,
            Err(join_err) => Err(IndexerError::Other(format!("producer task panicked: {join_err}"))),
        }
    }

    /// Builds `Combined(List(gaps), Node(current+1, polling_interval))`
    /// per §4.6.
    async fn default_producer(&self, token: &CancellationToken) -> Result<Arc<dyn HeightProducer>, IndexerError> {
        let (gaps, current) = compute_gaps(
            token,
            self.node.as_ref(),
            self.database.as_ref(),
            self.node.chain_id(),
            self.config.start_height,
            self.config.force_reparse_old_blocks,
        )
        .await?;

        tracing::info!(
            indexer_name = %self.name,
            gap_count = gaps.len(),
            current_height = current,
            "computed startup gaps"
        );

        let combined = CombinedProducer::new(vec![
            Box::new(ListProducer::new(gaps)),
            Box::new(NodeProducer::new(
                self.node.clone(),
                current + 1,
                self.config.node_polling_interval.0,
            )),
        ]);
        Ok(Arc::new(combined))
    }
}
