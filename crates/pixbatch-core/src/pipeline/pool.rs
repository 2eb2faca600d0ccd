//! Bounded worker pool that turns work items into result records.
//!
//! A dispatcher feeds item indices into a bounded queue, `concurrency`
//! workers pull from it and run each item on tokio's blocking pool, and a
//! single collector receives every record. A panicking item surfaces as a
//! `JoinError` and becomes a `WorkerFault` record; the other workers keep
//! going. Every item yields exactly one record, including items that never
//! ran because of a shutdown request.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::types::{ErrorKind, ItemState, ResultRecord, WorkItem};

use super::channel::{bounded_channel, WorkQueue};
use super::codec::WrittenOutput;

/// Processes a single work item. Runs on a blocking thread.
pub trait ItemHandler: Send + Sync + 'static {
    fn handle(&self, item: &WorkItem) -> PipelineResult<WrittenOutput>;
}

impl<F> ItemHandler for F
where
    F: Fn(&WorkItem) -> PipelineResult<WrittenOutput> + Send + Sync + 'static,
{
    fn handle(&self, item: &WorkItem) -> PipelineResult<WrittenOutput> {
        self(item)
    }
}

/// Bounded-parallelism executor with fault containment and cooperative
/// shutdown.
pub struct WorkerPool {
    concurrency: usize,
    config: PipelineConfig,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Create a pool running at most `concurrency` items at once.
    pub fn new(concurrency: usize, config: PipelineConfig) -> Self {
        Self {
            concurrency: concurrency.max(1),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an externally owned shutdown token.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Token that stops dispatching when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every item and collect the records in completion order.
    pub async fn run<H: ItemHandler>(
        &self,
        items: Vec<WorkItem>,
        handler: Arc<H>,
    ) -> Vec<ResultRecord> {
        self.run_with(items, handler, |_| {}).await
    }

    /// Run every item, invoking `on_result` for each record as it arrives.
    ///
    /// `on_result` is only ever called from the collector, one record at a
    /// time. Returns the records in arrival order.
    pub async fn run_with<H, F>(
        &self,
        items: Vec<WorkItem>,
        handler: Arc<H>,
        mut on_result: F,
    ) -> Vec<ResultRecord>
    where
        H: ItemHandler,
        F: FnMut(&ResultRecord),
    {
        if items.is_empty() {
            return Vec::new();
        }

        let total = items.len();
        let items: Arc<[WorkItem]> = items.into();
        let workers = self.concurrency.min(total);
        tracing::debug!("Starting {} worker(s) for {} item(s)", workers, total);

        let (job_tx, job_rx) = bounded_channel::<usize>(&self.config);
        let (result_tx, mut result_rx) = bounded_channel::<(usize, ResultRecord)>(&self.config);

        let dispatcher = {
            let shutdown = self.shutdown.clone();
            let items = Arc::clone(&items);
            tokio::spawn(async move {
                for index in 0..total {
                    tracing::trace!(
                        "{:?}: {:?}",
                        items[index].source,
                        ItemState::Queued
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        sent = job_tx.send(index) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let queue = WorkQueue::new(job_rx);
        let mut worker_set = JoinSet::new();
        for worker_id in 0..workers {
            let queue = queue.clone();
            let items = Arc::clone(&items);
            let handler = Arc::clone(&handler);
            let result_tx = result_tx.clone();
            let shutdown = self.shutdown.clone();
            worker_set.spawn(async move {
                loop {
                    let index = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        next = queue.next() => match next {
                            Some(index) => index,
                            None => break,
                        },
                    };
                    let record = run_item(worker_id, &items, index, Arc::clone(&handler)).await;
                    if result_tx.send((index, record)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut collector = Collector::new(total, &mut on_result);

        // Normal operation: collect until every worker has hung up.
        let mut shutting_down = false;
        loop {
            tokio::select! {
                biased;
                received = result_rx.recv() => match received {
                    Some((index, record)) => collector.deliver(index, record),
                    None => break,
                },
                _ = self.shutdown.cancelled() => {
                    shutting_down = true;
                    break;
                }
            }
        }

        // Shutdown: in-flight items get the grace period to finish.
        if shutting_down {
            let grace = Duration::from_millis(self.config.shutdown_grace_ms);
            let deadline = tokio::time::Instant::now() + grace;
            tracing::warn!(
                "Shutdown requested; waiting up to {:?} for in-flight items",
                grace
            );
            loop {
                match tokio::time::timeout_at(deadline, result_rx.recv()).await {
                    Ok(Some((index, record))) => collector.deliver(index, record),
                    Ok(None) => break,
                    Err(_) => {
                        tracing::warn!("Grace period elapsed; abandoning in-flight items");
                        break;
                    }
                }
            }
        }

        dispatcher.abort();
        worker_set.abort_all();
        while worker_set.join_next().await.is_some() {}

        // Anything still unreported never ran to completion.
        let (kind, message) = if self.shutdown.is_cancelled() {
            (ErrorKind::Cancelled, "not processed before shutdown")
        } else {
            (ErrorKind::WorkerFault, "worker exited without reporting a result")
        };
        for index in collector.pending() {
            let record = ResultRecord::failed(&items[index], kind, None, message, Duration::ZERO);
            collector.deliver(index, record);
        }

        collector.records
    }
}

/// Single consumer of the results channel. Delivers each index at most once.
struct Collector<'a, F> {
    reported: Vec<bool>,
    records: Vec<ResultRecord>,
    on_result: &'a mut F,
}

impl<'a, F: FnMut(&ResultRecord)> Collector<'a, F> {
    fn new(total: usize, on_result: &'a mut F) -> Self {
        Self {
            reported: vec![false; total],
            records: Vec::with_capacity(total),
            on_result,
        }
    }

    fn deliver(&mut self, index: usize, record: ResultRecord) {
        if std::mem::replace(&mut self.reported[index], true) {
            tracing::error!("Duplicate result for {:?} ignored", record.source_path);
            return;
        }
        (self.on_result)(&record);
        self.records.push(record);
    }

    fn pending(&self) -> Vec<usize> {
        self.reported
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(index, _)| index)
            .collect()
    }
}

/// Run one item on the blocking pool and turn its outcome into a record.
async fn run_item<H: ItemHandler>(
    worker_id: usize,
    items: &Arc<[WorkItem]>,
    index: usize,
    handler: Arc<H>,
) -> ResultRecord {
    let item = &items[index];
    tracing::debug!(
        worker = worker_id,
        "{:?}: {:?}",
        item.source,
        ItemState::InProgress
    );

    let start = Instant::now();
    let task_items = Arc::clone(items);
    let joined = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let outcome = handler.handle(&task_items[index]);
        (outcome, started.elapsed())
    })
    .await;

    let record = match joined {
        Ok((Ok(written), elapsed)) => {
            ResultRecord::completed(item, elapsed, written.bytes_written, written.hash)
        }
        Ok((Err(e), elapsed)) => {
            tracing::warn!(
                kind = %e.kind(),
                stage = e.stage().unwrap_or("-"),
                "Failed: {}",
                e
            );
            ResultRecord::failed(
                item,
                e.kind(),
                e.stage().map(str::to_string),
                e.message(),
                elapsed,
            )
        }
        Err(join_error) => {
            let message = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                "worker task was cancelled".to_string()
            };
            tracing::error!("Worker fault on {:?}: {}", item.source, message);
            ResultRecord::failed(item, ErrorKind::WorkerFault, None, message, start.elapsed())
        }
    };

    tracing::debug!(
        worker = worker_id,
        "{:?}: {:?} in {:?}",
        item.source,
        record.state(),
        record.elapsed
    );
    record
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformConfig;
    use crate::error::PipelineError;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| {
                WorkItem::new(
                    format!("in/{i:04}.png"),
                    format!("out/{i:04}.png"),
                    TransformConfig::default(),
                )
            })
            .collect()
    }

    fn ok_output() -> PipelineResult<WrittenOutput> {
        Ok(WrittenOutput {
            bytes_written: 1,
            hash: "h".to_string(),
        })
    }

    fn pool(concurrency: usize) -> WorkerPool {
        WorkerPool::new(
            concurrency,
            PipelineConfig {
                buffer_size: 2,
                shutdown_grace_ms: 50,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_input_returns_immediately() {
        let handler = Arc::new(|_: &WorkItem| ok_output());
        let records = pool(4).run(Vec::new(), handler).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_every_item_yields_exactly_one_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Arc::new(move |_: &WorkItem| {
            counter.fetch_add(1, Ordering::SeqCst);
            ok_output()
        });

        let input = items(200);
        let records = pool(4).run(input.clone(), handler).await;

        assert_eq!(records.len(), input.len());
        assert_eq!(calls.load(Ordering::SeqCst), input.len());
        let sources: HashSet<PathBuf> = records.iter().map(|r| r.source_path.clone()).collect();
        assert_eq!(sources.len(), input.len());
        assert!(records.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_panic_becomes_worker_fault() {
        let handler = Arc::new(|item: &WorkItem| {
            if item.source.ends_with("0003.png") {
                panic!("decoder exploded");
            }
            ok_output()
        });

        let records = pool(3).run(items(8), handler).await;
        assert_eq!(records.len(), 8);

        let faults: Vec<_> = records.iter().filter(|r| !r.success).collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].error_kind, Some(ErrorKind::WorkerFault));
        assert!(faults[0]
            .message
            .as_deref()
            .unwrap()
            .contains("decoder exploded"));
    }

    #[tokio::test]
    async fn test_pipeline_error_is_recorded_with_stage() {
        let handler = Arc::new(|item: &WorkItem| {
            if item.source.ends_with("0001.png") {
                return Err(PipelineError::Transform {
                    path: item.source.clone(),
                    stage: "sharpen".to_string(),
                    message: "unsupported mode".to_string(),
                });
            }
            ok_output()
        });

        let records = pool(2).run(items(4), handler).await;
        let failed: Vec<_> = records.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_kind, Some(ErrorKind::TransformError));
        assert_eq!(failed[0].stage.as_deref(), Some("sharpen"));
        assert_eq!(failed[0].state(), ItemState::Failed);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let handler = Arc::new(move |_: &WorkItem| {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            a.fetch_sub(1, Ordering::SeqCst);
            ok_output()
        });

        let records = pool(3).run(items(30), handler).await;
        assert_eq!(records.len(), 30);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_on_result_sees_every_record() {
        let handler = Arc::new(|_: &WorkItem| ok_output());
        let mut seen = 0;
        let records = pool(2)
            .run_with(items(17), handler, |_| seen += 1)
            .await;
        assert_eq!(seen, 17);
        assert_eq!(records.len(), 17);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_cancels_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Arc::new(move |_: &WorkItem| {
            counter.fetch_add(1, Ordering::SeqCst);
            ok_output()
        });

        let pool = pool(2);
        pool.shutdown_token().cancel();
        let records = pool.run(items(5), handler).await;

        assert_eq!(records.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(records
            .iter()
            .all(|r| r.error_kind == Some(ErrorKind::Cancelled)));
    }

    #[tokio::test]
    async fn test_shutdown_mid_run_still_accounts_for_all_items() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let handler = Arc::new(move |item: &WorkItem| {
            if item.source.ends_with("0002.png") {
                trigger.cancel();
            }
            std::thread::sleep(Duration::from_millis(10));
            ok_output()
        });

        let records = pool(1).with_shutdown(token).run(items(40), handler).await;

        assert_eq!(records.len(), 40);
        let completed = records.iter().filter(|r| r.success).count();
        let cancelled = records
            .iter()
            .filter(|r| r.error_kind == Some(ErrorKind::Cancelled))
            .count();
        assert!(completed >= 3);
        assert!(cancelled > 0);
        assert_eq!(completed + cancelled, 40);
    }

    #[tokio::test]
    async fn test_item_outliving_grace_period_is_cancelled() {
        use std::sync::{Condvar, Mutex};

        let token = CancellationToken::new();
        let trigger = token.clone();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let held = Arc::clone(&gate);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Arc::new(move |_: &WorkItem| {
            counter.fetch_add(1, Ordering::SeqCst);
            trigger.cancel();
            let (lock, cvar) = &*held;
            let released = lock.lock().unwrap();
            let _unused = cvar
                .wait_timeout_while(released, Duration::from_secs(10), |open| !*open)
                .unwrap();
            ok_output()
        });

        let start = Instant::now();
        let records = pool(1).with_shutdown(token).run(items(3), handler).await;
        let waited = start.elapsed();

        let (lock, cvar) = &*gate;
        *lock.lock().unwrap() = true;
        cvar.notify_all();

        assert!(waited < Duration::from_secs(5), "run took {waited:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| r.error_kind == Some(ErrorKind::Cancelled)));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("boom")), "panic: boom");
        assert_eq!(
            panic_message(Box::new(String::from("bang"))),
            "panic: bang"
        );
        assert_eq!(panic_message(Box::new(7u8)), "panic with non-string payload");
    }
}
