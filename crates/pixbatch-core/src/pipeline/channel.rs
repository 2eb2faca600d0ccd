//! Bounded channels for backpressure between dispatcher, workers and collector.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::config::PipelineConfig;

/// Create a bounded channel pair with the configured buffer size.
///
/// When the buffer is full, the sender will block, providing backpressure
/// so item count can far exceed worker count without unbounded growth.
pub fn bounded_channel<T>(config: &PipelineConfig) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(config.buffer_size.max(1))
}

/// A receiver shared by several workers; each item is handed to exactly one.
pub struct WorkQueue<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Take the next item, or `None` once the sender is gone and the buffer
    /// is drained.
    pub async fn next(&self) -> Option<T> {
        // The lock is held only while waiting for a single item
        let mut receiver = self.inner.lock().await;
        receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[tokio::test]
    async fn test_bounded_channel() {
        let config = PipelineConfig {
            buffer_size: 10,
            shutdown_grace_ms: 100,
        };

        let (tx, mut rx) = bounded_channel::<i32>(&config);

        tx.send(42).await.unwrap();
        let received = rx.recv().await;

        assert_eq!(received, Some(42));
    }

    #[tokio::test]
    async fn test_bounded_channel_applies_backpressure() {
        let config = PipelineConfig {
            buffer_size: 1,
            shutdown_grace_ms: 100,
        };
        let (tx, _rx) = bounded_channel::<i32>(&config);

        tx.try_send(1).unwrap();
        assert!(tx.try_send(2).is_err());
    }

    #[tokio::test]
    async fn test_work_queue_hands_each_item_out_once() {
        let (tx, rx) = mpsc::channel::<u32>(4);
        let queue = WorkQueue::new(rx);

        let mut workers = Vec::new();
        for _ in 0..3 {
            let queue = queue.clone();
            workers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = queue.next().await {
                    seen.push(item);
                }
                seen
            }));
        }

        for i in 0..50 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let mut all = Vec::new();
        for worker in workers {
            all.extend(worker.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }
}
