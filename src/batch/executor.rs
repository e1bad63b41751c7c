//! Batch executor
//!
//! Runs an async operation over every item of a batch with:
//! - Concurrency bounded by a semaphore-backed limiter
//! - Results placed by input index, whatever order tasks finish in
//! - Stop-on-error or continue-on-error failure handling
//! - A join of every spawned task before the run returns, on every path
//! - Progress tracking, run statistics, metrics and logging

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Instrument, Span};
use uuid::Uuid;

use crate::batch::{
    BatchConfig, BatchError, BatchOutcome, BatchStats, ConcurrencyLimiter, ErrorAggregator,
    ErrorPolicy, ProgressCallback, ResultCollector,
};
use crate::metrics::{MetricsCollector, Timer};

/// Batch executor for running one operation over many items in parallel
pub struct BatchExecutor {
    /// Maximum concurrent items, zero for unbounded
    batch_size: usize,
    /// Failure policy
    policy: ErrorPolicy,
    /// Progress callback
    progress_callback: Option<Arc<ProgressCallback>>,
    /// Statistics of the most recent run
    last_stats: Mutex<Option<BatchStats>>,
}

impl fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("batch_size", &self.batch_size)
            .field("policy", &self.policy)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl BatchExecutor {
    /// Create a new batch executor with default settings
    pub fn new() -> Self {
        Self::from_config(&BatchConfig::default())
    }

    /// Create an executor from a configuration
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            policy: config.policy,
            progress_callback: None,
            last_stats: Mutex::new(None),
        }
    }

    /// Set the number of items allowed in flight at once. Zero means unbounded.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the failure policy
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set progress callback
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Configured batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Configured failure policy
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Statistics of the most recent run, if any
    pub fn last_stats(&self) -> Option<BatchStats> {
        self.last_stats.lock().clone()
    }

    /// Run `process` over every item, at most `batch_size` at a time.
    ///
    /// Results come back in input order. Under StopOnError the first failure
    /// is returned with no results, and no new item is scheduled once the
    /// scheduling loop has seen it; items already running are left to
    /// finish. Under ContinueOnError every item runs, failed slots keep
    /// `R::default()` and all failures are returned as one aggregate.
    ///
    /// Every spawned task is joined before this returns. If an item panicked,
    /// the panic is resumed here after the join. Dropping the returned future
    /// before it completes aborts every task it spawned.
    #[instrument(
        skip(self, items, process),
        fields(
            run_id = %Uuid::new_v4(),
            item_count = tracing::field::Empty,
            batch_size = self.batch_size,
            policy = %self.policy,
        )
    )]
    pub async fn run<I, T, R, E, F, Fut>(&self, items: I, process: F) -> BatchOutcome<R, E>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
        T: Send + 'static,
        R: Default + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let timer = Timer::start();
        let batch_start = Instant::now();
        let started_at = Utc::now();
        let items = items.into_iter();
        let total_items = items.len();
        Span::current().record("item_count", total_items);

        let metrics = MetricsCollector::new(self.policy.as_str());
        let mut stats = BatchStats::empty(total_items);
        stats.started_at = started_at;

        if total_items == 0 {
            debug!("No items to process in batch");
            metrics.record_run("ok", timer.elapsed_secs());
            *self.last_stats.lock() = Some(stats.clone());
            return BatchOutcome {
                results: Vec::new(),
                error: None,
                stats,
            };
        }

        let limiter = ConcurrencyLimiter::new(self.batch_size);
        info!(
            total_items = total_items,
            capacity = limiter.capacity(),
            policy = %self.policy,
            "Starting batch run"
        );

        let collector = Arc::new(ResultCollector::new(total_items));
        let aggregator = Arc::new(ErrorAggregator::new(self.policy));
        let process = Arc::new(process);

        let completed_count = Arc::new(AtomicUsize::new(0));
        let succeeded_count = Arc::new(AtomicUsize::new(0));
        let failed_count = Arc::new(AtomicUsize::new(0));
        let progress_callback = self.progress_callback.clone();

        // Aborts whatever is still running if this future is dropped.
        let mut tasks = JoinSet::new();

        for (index, item) in items.enumerate() {
            let permit = limiter.acquire().await;
            debug!(index = index, in_flight = limiter.in_flight(), "Item admitted");

            let process = Arc::clone(&process);
            let collector = Arc::clone(&collector);
            let task_aggregator = Arc::clone(&aggregator);
            let completed = Arc::clone(&completed_count);
            let succeeded = Arc::clone(&succeeded_count);
            let failed = Arc::clone(&failed_count);
            let progress = progress_callback.clone();

            let task = async move {
                // Held for the whole task so the slot frees on every exit, unwinding included.
                let _permit = permit;
                metrics.record_task_start();

                let outcome = match (*process)(item).await {
                    Ok(value) => {
                        collector.store(index, value);
                        succeeded.fetch_add(1, Ordering::SeqCst);
                        debug!(index = index, "Item succeeded");
                        "succeeded"
                    }
                    Err(err) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        warn!(index = index, error = %err, "Item failed");
                        if !task_aggregator.report(err) {
                            debug!(index = index, "Dropped failure, an earlier one is already held");
                        }
                        "failed"
                    }
                };
                metrics.record_task_end(outcome);

                let current_completed = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(ref callback) = progress {
                    callback(current_completed, total_items);
                }
            };
            tasks.spawn(task.instrument(Span::current()));
            stats.scheduled += 1;

            if self.policy == ErrorPolicy::StopOnError && aggregator.has_failed() {
                if index + 1 < total_items {
                    stats.stopped_early = true;
                    warn!(
                        scheduled = stats.scheduled,
                        remaining = total_items - index - 1,
                        "Failure observed, no further items will be scheduled"
                    );
                }
                break;
            }
        }

        // Join every spawned task, early stop or not.
        let mut panic_payload: Option<Box<dyn Any + Send>> = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    stats.panicked += 1;
                    metrics.record_task_end("panicked");
                    error!(error = %e, "Item task panicked");
                    let current_completed = completed_count.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = progress_callback {
                        callback(current_completed, total_items);
                    }
                    if panic_payload.is_none() {
                        panic_payload = Some(e.into_panic());
                    }
                } else {
                    error!(error = %e, "Item task was cancelled");
                }
            }
        }

        let error = aggregator.finish();
        let results = match (&error, self.policy) {
            (Some(_), ErrorPolicy::StopOnError) => Vec::new(),
            _ => collector.take(),
        };

        stats.succeeded = succeeded_count.load(Ordering::SeqCst);
        stats.failed = failed_count.load(Ordering::SeqCst);
        stats.duration = batch_start.elapsed();

        let status = if panic_payload.is_some() {
            "panicked"
        } else if error.is_some() {
            "failed"
        } else {
            "ok"
        };
        metrics.record_run(status, timer.elapsed_secs());

        info!(
            total_items = total_items,
            scheduled = stats.scheduled,
            succeeded = stats.succeeded,
            failed = stats.failed,
            panicked = stats.panicked,
            stopped_early = stats.stopped_early,
            success_rate = format!("{:.2}%", stats.success_rate()),
            batch_duration_ms = stats.duration.as_millis(),
            "Batch run completed"
        );

        if stats.success_rate() < 80.0 && total_items > 5 {
            warn!(
                success_rate = format!("{:.2}%", stats.success_rate()),
                failed = stats.failed,
                "High failure rate detected in batch run"
            );
        }

        *self.last_stats.lock() = Some(stats.clone());

        if let Some(payload) = panic_payload {
            std::panic::resume_unwind(payload);
        }

        BatchOutcome {
            results,
            error,
            stats,
        }
    }

    /// Run `process` over every item for its side effects only, under this
    /// executor's policy.
    pub async fn process<I, T, E, F, Fut>(&self, items: I, process: F) -> Result<(), BatchError<E>>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.run(items, process).await.into_result().map(|_| ())
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `process` over `items` with at most `batch_size` in flight, under `policy`.
///
/// A `batch_size` of zero means unbounded concurrency.
pub async fn run<I, T, R, E, F, Fut>(
    items: I,
    batch_size: usize,
    policy: ErrorPolicy,
    process: F,
) -> BatchOutcome<R, E>
where
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
    T: Send + 'static,
    R: Default + Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    BatchExecutor::new()
        .with_batch_size(batch_size)
        .with_policy(policy)
        .run(items, process)
        .await
}

/// Run `process` over `items` for its side effects, stopping at the first failure.
pub async fn process<I, T, E, F, Fut>(items: I, batch_size: usize, process: F) -> Result<(), BatchError<E>>
where
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    BatchExecutor::new()
        .with_batch_size(batch_size)
        .with_policy(ErrorPolicy::StopOnError)
        .process(items, process)
        .await
}
