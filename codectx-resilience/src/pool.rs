//! Bounded worker pool and batch processing (spec §4.1.3).

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::ResilienceError;

/// A counting semaphore with an explicit `release` that panics on misuse,
/// per spec §5's "Release without Acquire is a programming error that must
/// fail loudly". Capacity is coerced to at least 1.
pub struct Semaphore {
    capacity: usize,
    available: AtomicUsize,
    notify: Notify,
}

impl Semaphore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            available: AtomicUsize::new(capacity),
            notify: Notify::new(),
        }
    }

    /// Wait until a permit is free or `cancel` fires, whichever first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ResilienceError> {
        loop {
            if self.try_acquire() {
                return Ok(());
            }
            tokio::select! {
                () = self.notify.notified() => {}
                () = cancel.cancelled() => return Err(ResilienceError::Cancelled),
            }
        }
    }

    /// Non-blocking acquire; returns `false` if no permit is currently free.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.available.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Return a permit. Panics if this would exceed `capacity`, which can
    /// only happen if `release` is called without a matching `acquire`.
    pub fn release(&self) {
        let previous = self.available.fetch_add(1, Ordering::AcqRel);
        if previous >= self.capacity {
            self.available.fetch_sub(1, Ordering::AcqRel);
            panic!("Semaphore::release called without a matching acquire");
        }
        self.notify.notify_one();
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }
}

/// Bounded worker pool configuration (spec §6's concurrency options).
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub capacity: usize,
    pub per_entity_timeout: Duration,
    pub total_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            per_entity_timeout: Duration::from_secs(30),
            total_timeout: Duration::from_secs(600),
        }
    }
}

/// How a single work item concluded.
#[derive(Debug)]
pub enum WorkOutcome<R> {
    Success(R),
    Error(String),
    Cancelled,
}

/// The outcome of one submitted item, including which position it held in
/// the submitted batch (`index`) for callers that need to correlate back.
#[derive(Debug)]
pub struct WorkResult<R> {
    pub index: usize,
    pub outcome: WorkOutcome<R>,
    pub duration: Duration,
}

/// Aggregate outcome of `WorkerPool::process_batch`.
#[derive(Debug)]
pub struct BatchResult<R> {
    /// In *completion* order, not submission order (spec §5).
    pub results: Vec<WorkResult<R>>,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_duration: Duration,
    pub cancelled: bool,
}

/// Executes a bounded-concurrency batch of async work, each item racing its
/// own `per_entity_timeout` against the batch's shared `total_timeout`.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    #[must_use]
    pub fn new(config: WorkerPoolConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.capacity));
        Self { semaphore, config }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available()
    }

    /// Run `items` through `worker` with at most `config.capacity` in
    /// flight. A failing item never cancels its peers. On cancellation,
    /// no further items are admitted but already-spawned items run to
    /// their per-item deadline. `progress_cb`'s `completed` counter is
    /// monotonically non-decreasing.
    pub async fn process_batch<T, R, F, Fut>(
        &self,
        cancel: CancellationToken,
        items: Vec<T>,
        worker: F,
        progress_cb: Option<Arc<dyn Fn(usize, usize, &WorkResult<R>) + Send + Sync>>,
    ) -> BatchResult<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(usize, T) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<R, String>> + Send,
    {
        let total = items.len();
        let start = Instant::now();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<WorkResult<R>>();

        for (index, item) in items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                let _ = tx.send(WorkResult {
                    index,
                    outcome: WorkOutcome::Cancelled,
                    duration: Duration::ZERO,
                });
                continue;
            }
            let semaphore = self.semaphore.clone();
            let cancel_child = cancel.clone();
            let worker = worker.clone();
            let tx = tx.clone();
            let per_item_timeout = self.config.per_entity_timeout;
            tokio::spawn(async move {
                if semaphore.acquire(&cancel_child).await.is_err() {
                    let _ = tx.send(WorkResult {
                        index,
                        outcome: WorkOutcome::Cancelled,
                        duration: Duration::ZERO,
                    });
                    return;
                }
                let item_start = Instant::now();
                let outcome = match tokio::time::timeout(per_item_timeout, worker(index, item)).await
                {
                    Ok(Ok(v)) => WorkOutcome::Success(v),
                    Ok(Err(e)) => WorkOutcome::Error(e),
                    Err(_) => WorkOutcome::Error("per-item deadline exceeded".to_string()),
                };
                semaphore.release();
                let _ = tx.send(WorkResult {
                    index,
                    outcome,
                    duration: item_start.elapsed(),
                });
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        let mut seen = vec![false; total];
        let mut completed = 0usize;
        let mut timed_out = false;
        let deadline = tokio::time::sleep(self.config.total_timeout);
        tokio::pin!(deadline);

        while results.len() < total {
            tokio::select! {
                biased;
                () = &mut deadline, if !timed_out => {
                    timed_out = true;
                }
                maybe = rx.recv() => {
                    match maybe {
                        Some(r) => {
                            seen[r.index] = true;
                            completed += 1;
                            if let Some(cb) = progress_cb.as_ref() {
                                cb(completed, total, &r);
                            }
                            results.push(r);
                        }
                        None => break,
                    }
                }
            }
            if timed_out {
                break;
            }
        }

        for (index, was_seen) in seen.into_iter().enumerate() {
            if !was_seen {
                results.push(WorkResult {
                    index,
                    outcome: WorkOutcome::Cancelled,
                    duration: Duration::ZERO,
                });
            }
        }

        let success_count = results
            .iter()
            .filter(|r| matches!(r.outcome, WorkOutcome::Success(_)))
            .count();
        let failure_count = results.len() - success_count;

        BatchResult {
            results,
            success_count,
            failure_count,
            total_duration: start.elapsed(),
            cancelled: timed_out || cancel.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn semaphore_coerces_zero_capacity_to_one() {
        let sem = Semaphore::new(0);
        assert_eq!(sem.available(), 1);
    }

    #[test]
    #[should_panic(expected = "matching acquire")]
    fn unbalanced_release_panics() {
        let sem = Semaphore::new(2);
        sem.release();
        sem.release();
        sem.release();
    }

    #[tokio::test]
    async fn try_acquire_respects_capacity() {
        let sem = Semaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert!(sem.try_acquire());
    }

    #[tokio::test]
    async fn every_item_produces_one_result() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            capacity: 2,
            per_entity_timeout: Duration::from_secs(1),
            total_timeout: Duration::from_secs(5),
        });
        let items: Vec<u32> = (0..10).collect();
        let result = pool
            .process_batch(
                CancellationToken::new(),
                items,
                |_idx, item| async move { Ok::<_, String>(item * 2) },
                None,
            )
            .await;
        assert_eq!(result.results.len(), 10);
        assert_eq!(result.success_count, 10);
        assert_eq!(result.failure_count, 0);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_peers() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let items: Vec<u32> = (0..5).collect();
        let result = pool
            .process_batch(
                CancellationToken::new(),
                items,
                |idx, item| async move {
                    if idx == 2 {
                        Err("boom".to_string())
                    } else {
                        Ok(item)
                    }
                },
                None,
            )
            .await;
        assert_eq!(result.results.len(), 5);
        assert_eq!(result.success_count, 4);
        assert_eq!(result.failure_count, 1);
    }

    #[tokio::test]
    async fn per_item_timeout_is_reported_as_failure() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            capacity: 4,
            per_entity_timeout: Duration::from_millis(20),
            total_timeout: Duration::from_secs(5),
        });
        let result = pool
            .process_batch(
                CancellationToken::new(),
                vec![1u32],
                |_idx, _item| async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, String>(1)
                },
                None,
            )
            .await;
        assert_eq!(result.failure_count, 1);
    }

    #[tokio::test]
    async fn progress_callback_is_monotonic() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let last = Arc::new(AtomicU32::new(0));
        let last2 = last.clone();
        let cb: Arc<dyn Fn(usize, usize, &WorkResult<u32>) + Send + Sync> =
            Arc::new(move |completed, _total, _r| {
                let prev = last2.swap(completed as u32, Ordering::SeqCst);
                assert!(completed as u32 >= prev);
            });
        let items: Vec<u32> = (0..20).collect();
        let result = pool
            .process_batch(
                CancellationToken::new(),
                items,
                |_idx, item| async move { Ok::<_, String>(item) },
                Some(cb),
            )
            .await;
        assert_eq!(result.results.len(), 20);
    }

    #[tokio::test]
    async fn pre_cancelled_token_admits_nothing() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pool
            .process_batch(
                cancel,
                vec![1u32, 2, 3],
                |_idx, item| async move { Ok::<_, String>(item) },
                None,
            )
            .await;
        assert_eq!(result.results.len(), 3);
        assert!(result
            .results
            .iter()
            .all(|r| matches!(r.outcome, WorkOutcome::Cancelled)));
        assert!(result.cancelled);
    }
}
