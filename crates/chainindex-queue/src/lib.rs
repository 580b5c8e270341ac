//! A bounded, closable, cancellation-aware FIFO (§4.1 of the engine
//! design). Built on [`flume`]'s bounded MPMC channel — the same crate
//! other bounded work-distribution pipelines in this ecosystem reach
//! for — wrapped so that `close()` is an explicit, idempotent operation
//! rather than implicit sender-drop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainindex_core::CancellationToken;

pub struct Queue<T> {
    tx: Mutex<Option<flume::Sender<T>>>,
    rx: flume::Receiver<T>,
}

impl<T> Queue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    fn sender(&self) -> Option<flume::Sender<T>> {
        self.tx.lock().expect("queue sender mutex poisoned").clone()
    }

    /// Blocks until there is space. Panics if called after [`Self::close`]
    /// — the contract (§4.1) is that enqueue after close is a programmer
    /// error, not a runtime condition callers are expected to handle.
    pub async fn enqueue(&self, value: T) {
        let tx = self
            .sender()
            .expect("enqueue called on a closed queue");
        // The only way `send_async` fails is if every receiver has been
        // dropped, which this type never does on its own.
        let _ = tx.send_async(value).await;
    }

    /// Blocks until there is space or `token` cancels. Returns `false`
    /// iff cancellation won the race before a slot was obtained.
    pub async fn enqueue_with_context(&self, token: &CancellationToken, value: T) -> bool {
        let Some(tx) = self.sender() else {
            return false;
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            result = tx.send_async(value) => result.is_ok(),
        }
    }

    /// Schedules `value` to be enqueued after `delay`, in a detached
    /// background task, so the caller (typically a worker re-enqueueing
    /// a failed height) never blocks on it. Drops the value silently if
    /// `token` cancels before the delay elapses or before a slot opens.
    pub fn spawn_delayed_enqueue(queue: &Arc<Self>, token: CancellationToken, delay: Duration, value: T)
    where
        T: Send + 'static,
    {
        let queue = Arc::clone(queue);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    queue.enqueue_with_context(&token, value).await;
                }
            }
        });
    }

    /// Blocks until a value is available; returns `None` once the queue
    /// is closed and drained.
    pub async fn dequeue(&self) -> Option<T> {
        self.rx.recv_async().await.ok()
    }

    /// A single non-blocking cancellation check, then a normal
    /// [`Self::dequeue`]. Mirrors the reference producer/worker loop:
    /// cancellation is re-checked once per loop iteration, not
    /// continuously raced against an in-flight dequeue.
    pub async fn context_dequeue(&self, token: &CancellationToken) -> Option<T> {
        if token.is_cancelled() {
            return None;
        }
        self.dequeue().await
    }

    /// Idempotent. After this, `enqueue`/`enqueue_with_context` observe a
    /// closed queue; `dequeue` keeps returning whatever was already
    /// buffered, in FIFO order, then `None` forever.
    pub fn close(&self) {
        self.tx
            .lock()
            .expect("queue sender mutex poisoned")
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().expect("queue sender mutex poisoned").is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn fifo_order_for_direct_enqueues() {
        let queue = Queue::new(8);
        for i in 0..5 {
            queue.enqueue(i).await;
        }
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(queue.dequeue().await.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn close_drains_then_reports_closed_forever() {
        let queue = Queue::new(8);
        queue.enqueue(1).await;
        queue.enqueue(2).await;
        queue.close();
        assert_eq!(queue.dequeue().await, Some(1));
        assert_eq!(queue.dequeue().await, Some(2));
        assert_eq!(queue.dequeue().await, None);
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let queue: Queue<i32> = Queue::new(1);
        queue.close();
        queue.close();
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn enqueue_with_context_returns_false_on_precancelled_token() {
        let queue = Queue::new(1);
        let token = CancellationToken::new();
        token.cancel();
        assert!(!queue.enqueue_with_context(&token, 1).await);
    }

    #[tokio::test]
    async fn enqueue_with_context_returns_true_when_slot_available() {
        let queue = Queue::new(1);
        let token = CancellationToken::new();
        assert!(queue.enqueue_with_context(&token, 1).await);
        assert_eq!(queue.dequeue().await, Some(1));
    }

    #[tokio::test]
    async fn enqueue_with_context_unblocks_on_cancel_while_queue_is_full() {
        let queue = Arc::new(Queue::new(1));
        queue.enqueue(0).await; // fill capacity
        let token = CancellationToken::new();
        let blocked_queue = queue.clone();
        let blocked_token = token.clone();
        let handle = tokio::spawn(async move {
            blocked_queue.enqueue_with_context(&blocked_token, 1).await
        });
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!handle.is_finished());
        token.cancel();
        let result = tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("cancellation should unblock enqueue_with_context")
            .unwrap();
        assert!(!result);
    }

    #[tokio::test]
    async fn context_dequeue_returns_none_when_precancelled() {
        let queue: Queue<i32> = Queue::new(1);
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(queue.context_dequeue(&token).await, None);
    }

    #[tokio::test]
    async fn delayed_enqueue_arrives_after_direct_enqueues() {
        let queue = Arc::new(Queue::new(8));
        let token = CancellationToken::new();
        Queue::spawn_delayed_enqueue(&queue, token, StdDuration::from_millis(20), 99);
        queue.enqueue(1).await;
        queue.enqueue(2).await;
        assert_eq!(queue.dequeue().await, Some(1));
        assert_eq!(queue.dequeue().await, Some(2));
        assert_eq!(queue.dequeue().await, Some(99));
    }

    #[tokio::test]
    async fn delayed_enqueue_drops_value_if_cancelled_first() {
        let queue = Arc::new(Queue::new(8));
        let token = CancellationToken::new();
        Queue::spawn_delayed_enqueue(&queue, token.clone(), StdDuration::from_millis(50), 99);
        token.cancel();
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        queue.close();
        assert_eq!(queue.dequeue().await, None);
    }
}
