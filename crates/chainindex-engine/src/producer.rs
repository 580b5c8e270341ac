//! Height producers (§4.5): the only writers onto an indexer's queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use chainindex_core::{CancellationToken, Height, IndexerError, IndexerHeight, Node};
use chainindex_queue::Queue;

#[async_trait]
pub trait HeightProducer: Send + Sync {
    async fn enqueue_heights(
        &self,
        token: &CancellationToken,
        queue: &Queue<IndexerHeight>,
    ) -> Result<(), IndexerError>;
}

async fn emit_one(
    token: &CancellationToken,
    queue: &Queue<IndexerHeight>,
    height: Height,
) -> Result<(), IndexerError> {
    if queue
        .enqueue_with_context(token, IndexerHeight::new(height))
        .await
    {
        Ok(())
    } else {
        Err(IndexerError::Cancelled)
    }
}

/// Emits `from..=to` inclusive, then returns. An inverted range emits
/// nothing (used when a gap computation yields an empty window).
pub struct RangeProducer {
    pub from: Height,
    pub to: Height,
}

impl RangeProducer {
    pub fn new(from: Height, to: Height) -> Self {
        Self { from, to }
    }
}

#[async_trait]
impl HeightProducer for RangeProducer {
    async fn enqueue_heights(
        &self,
        token: &CancellationToken,
        queue: &Queue<IndexerHeight>,
    ) -> Result<(), IndexerError> {
        if self.from > self.to {
            return Ok(());
        }
        for h in self.from..=self.to {
            emit_one(token, queue, h).await?;
        }
        Ok(())
    }
}

/// Emits a fixed, possibly non-contiguous sequence of heights, then
/// returns. Used for the startup gap list.
pub struct ListProducer {
    pub heights: Vec<Height>,
}

impl ListProducer {
    pub fn new(heights: Vec<Height>) -> Self {
        Self { heights }
    }
}

#[async_trait]
impl HeightProducer for ListProducer {
    async fn enqueue_heights(
        &self,
        token: &CancellationToken,
        queue: &Queue<IndexerHeight>,
    ) -> Result<(), IndexerError> {
        for &h in &self.heights {
            emit_one(token, queue, h).await?;
        }
        Ok(())
    }
}

/// Never returns on its own: polls `node.current_height` and emits every
/// height from the cursor up to the node's answer, inclusive, each
/// iteration. A stale (lower) reading is logged and ignored without
/// rewinding the cursor — see the cursor-update note on
/// [`HeightProducer::enqueue_heights`]'s implementation below.
pub struct NodeProducer {
    node: Arc<dyn Node>,
    polling_interval: Duration,
    cursor: AtomicU64,
}

impl NodeProducer {
    pub fn new(node: Arc<dyn Node>, from: Height, polling_interval: Duration) -> Self {
        Self {
            node,
            polling_interval,
            cursor: AtomicU64::new(from),
        }
    }
}

#[async_trait]
impl HeightProducer for NodeProducer {
    async fn enqueue_heights(
        &self,
        token: &CancellationToken,
        queue: &Queue<IndexerHeight>,
    ) -> Result<(), IndexerError> {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(IndexerError::Cancelled),
                _ = tokio::time::sleep(self.polling_interval) => {}
            }

            let current = match self.node.current_height(token).await {
                Ok(h) => h,
                Err(e) if e.is_retryable() => {
                    tracing::warn!(error = %e, "transient error polling current height; retrying next interval");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let cursor = self.cursor.load(Ordering::SeqCst);
            if current >= cursor {
                for h in cursor..=current {
                    emit_one(token, queue, h).await?;
                }
            } else {
                tracing::debug!(current, cursor, "node reported a height below the cursor; ignoring stale read");
            }
            // Uniform update in both branches: the cursor never rewinds.
            let next_cursor = cursor.max(current.saturating_add(1));
            self.cursor.store(next_cursor, Ordering::SeqCst);
        }
    }
}

/// Runs each producer to completion, in order; the next one starts only
/// after the previous returns. Any producer error terminates the chain.
pub struct CombinedProducer {
    producers: Vec<Box<dyn HeightProducer>>,
}

impl CombinedProducer {
    pub fn new(producers: Vec<Box<dyn HeightProducer>>) -> Self {
        Self { producers }
    }
}

#[async_trait]
impl HeightProducer for CombinedProducer {
    async fn enqueue_heights(
        &self,
        token: &CancellationToken,
        queue: &Queue<IndexerHeight>,
    ) -> Result<(), IndexerError> {
        for producer in &self.producers {
            producer.enqueue_heights(token, queue).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainindex_core::Block;

    struct StubNode {
        chain_id: String,
        heights: std::sync::Mutex<Vec<Height>>,
    }

    #[async_trait]
    impl Node for StubNode {
        fn chain_id(&self) -> &str {
            &self.chain_id
        }

        async fn current_height(&self, _token: &CancellationToken) -> Result<Height, IndexerError> {
            let mut heights = self.heights.lock().unwrap();
            if heights.len() > 1 {
                Ok(heights.remove(0))
            } else {
                Ok(heights[0])
            }
        }

        async fn lowest_height(&self, _token: &CancellationToken) -> Result<Height, IndexerError> {
            Ok(0)
        }

        async fn block(&self, _token: &CancellationToken, _height: Height) -> Result<Block, IndexerError> {
            unimplemented!("not exercised by producer tests")
        }
    }

    #[tokio::test]
    async fn range_producer_emits_inclusive_bounds_in_order() {
        let queue = Queue::new(16);
        let token = CancellationToken::new();
        RangeProducer::new(5, 8)
            .enqueue_heights(&token, &queue)
            .await
            .unwrap();
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(queue.dequeue().await.unwrap().height);
        }
        assert_eq!(seen, vec![5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn range_producer_emits_nothing_for_inverted_range() {
        let queue = Queue::new(4);
        let token = CancellationToken::new();
        RangeProducer::new(8, 5)
            .enqueue_heights(&token, &queue)
            .await
            .unwrap();
        queue.close();
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn list_producer_emits_given_sequence() {
        let queue = Queue::new(16);
        let token = CancellationToken::new();
        ListProducer::new(vec![6, 8, 11])
            .enqueue_heights(&token, &queue)
            .await
            .unwrap();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(queue.dequeue().await.unwrap().height);
        }
        assert_eq!(seen, vec![6, 8, 11]);
    }

    #[tokio::test]
    async fn combined_producer_runs_sequentially() {
        let queue = Queue::new(16);
        let token = CancellationToken::new();
        let combined = CombinedProducer::new(vec![
            Box::new(RangeProducer::new(1, 2)),
            Box::new(ListProducer::new(vec![10])),
        ]);
        combined.enqueue_heights(&token, &queue).await.unwrap();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(queue.dequeue().await.unwrap().height);
        }
        assert_eq!(seen, vec![1, 2, 10]);
    }

    #[tokio::test]
    async fn node_producer_ignores_stale_reading_without_rewinding_cursor() {
        let queue = Arc::new(Queue::new(64));
        let token = CancellationToken::new();
        let node = Arc::new(StubNode {
            chain_id: "test".into(),
            heights: std::sync::Mutex::new(vec![10, 3, 12]),
        });
        let producer = Arc::new(NodeProducer::new(node, 10, Duration::from_millis(1)));

        let run_queue = queue.clone();
        let run_token = token.clone();
        let run_producer = producer.clone();
        let handle = tokio::spawn(async move {
            run_producer.enqueue_heights(&run_token, &run_queue).await
        });

        // First tick emits 10 (cursor 10 -> current 10, cursor becomes 11).
        assert_eq!(queue.dequeue().await.unwrap().height, 10);
        // Second tick reports 3 < cursor(11): stale, ignored, no emission.
        // Third tick reports 12 >= cursor(11): emits 11, 12.
        assert_eq!(queue.dequeue().await.unwrap().height, 11);
        assert_eq!(queue.dequeue().await.unwrap().height, 12);

        token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
