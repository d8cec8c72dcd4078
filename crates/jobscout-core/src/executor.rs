//! Bounded-concurrency task execution.
//!
//! Tasks flow through a `buffer_unordered` stream so at most `max_workers`
//! are in flight at once; results surface in completion order. Each task
//! waits on the shared per-source throttle before its first attempt and
//! runs under the retry policy.

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::AppError;
use crate::models::{RawListing, SearchTask};
use crate::retry::RetryPolicy;
use crate::throttle::SourceThrottle;
use crate::traits::JobSource;

/// What happened to one task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The source answered. Zero listings is still a success.
    Fetched(Vec<RawListing>),
    /// Permanent error, or a transient one that outlived its retries.
    Failed(AppError),
    /// Never dispatched: the run was cancelled first.
    Skipped,
}

/// One task paired with its outcome, as yielded by [`SearchExecutor::run`].
#[derive(Debug)]
pub struct TaskResult {
    pub task: SearchTask,
    pub outcome: TaskOutcome,
}

/// Runs search tasks against a source with bounded concurrency.
///
/// Cancellation is graceful: tasks already in flight finish (their results
/// still count), tasks not yet started come back as [`TaskOutcome::Skipped`].
#[derive(Clone)]
pub struct SearchExecutor<S: JobSource> {
    source: S,
    throttle: SourceThrottle,
    retry: RetryPolicy,
    options: FetchConfig,
    cancel: CancellationToken,
}

impl<S: JobSource> SearchExecutor<S> {
    pub fn new(
        source: S,
        throttle: SourceThrottle,
        retry: RetryPolicy,
        options: FetchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            throttle,
            retry,
            options,
            cancel,
        }
    }

    /// Stream every task's result, at most `max_workers` in flight at once.
    pub fn run(
        &self,
        tasks: Vec<SearchTask>,
        max_workers: usize,
    ) -> impl Stream<Item = TaskResult> + '_ {
        stream::iter(tasks)
            .map(move |task| self.run_task(task))
            .buffer_unordered(max_workers.max(1))
    }

    async fn run_task(&self, task: SearchTask) -> TaskResult {
        if self.cancel.is_cancelled() {
            debug!(task = %task, "run cancelled, skipping task");
            return TaskResult {
                task,
                outcome: TaskOutcome::Skipped,
            };
        }

        let result = self
            .retry
            .run(&self.cancel, || async {
                // Every attempt waits for a slot, so a cooldown armed by a
                // rate-limited attempt delays the retry of this very task.
                self.throttle.acquire(task.source).await;
                match self.source.fetch(&task, &self.options).await {
                    Ok(listings) => Ok(listings),
                    Err(err) => {
                        if err.is_rate_limit() {
                            self.throttle.report_rate_limit(task.source).await;
                        }
                        Err(err)
                    }
                }
            })
            .await;

        let outcome = match result {
            Ok(listings) => {
                debug!(task = %task, count = listings.len(), "task finished");
                TaskOutcome::Fetched(listings)
            }
            Err(err) => {
                warn!(task = %task, error = %err, "task failed");
                TaskOutcome::Failed(err)
            }
        };

        TaskResult { task, outcome }
    }
}
