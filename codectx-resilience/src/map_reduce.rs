//! Order-preserving map over a bounded worker pool (spec §4.1.3).

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::pool::{WorkOutcome, WorkerPool};

/// Result of `map_reduce`: `results[i]` corresponds positionally to the
/// `i`-th input item, `None` where that item errored, was cancelled, or
/// never ran because an earlier total-timeout/cancellation cut the batch
/// short. `error` holds the first error observed, by completion order.
#[derive(Debug)]
pub struct MapReduceOutcome<R> {
    pub results: Vec<Option<R>>,
    pub error: Option<String>,
    pub cancelled: bool,
}

/// Runs `mapper` over `items` through `pool`, preserving input order in
/// the returned slice regardless of completion order. The first error
/// observed does not stop in-flight peers; it is surfaced alongside
/// whatever results did complete.
pub async fn map_reduce<T, R, F, Fut>(
    pool: &WorkerPool,
    cancel: CancellationToken,
    items: Vec<T>,
    mapper: F,
) -> MapReduceOutcome<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<R, String>> + Send,
{
    let batch = pool.process_batch(cancel, items, mapper, None).await;

    let mut results: Vec<Option<R>> = (0..batch.results.len()).map(|_| None).collect();
    let mut first_error = None;

    for item in batch.results {
        match item.outcome {
            WorkOutcome::Success(v) => results[item.index] = Some(v),
            WorkOutcome::Error(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            WorkOutcome::Cancelled => {
                if first_error.is_none() {
                    first_error = Some("item cancelled before completion".to_string());
                }
            }
        }
    }

    MapReduceOutcome {
        results,
        error: first_error,
        cancelled: batch.cancelled,
    }
}
