//! The run pipeline: generate tasks, execute, aggregate, persist.

use std::fmt;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dedup::DedupSet;
use crate::error::AppError;
use crate::executor::{SearchExecutor, TaskOutcome};
use crate::models::{Listing, RunReport, RunStats};
use crate::postfilter::PostFilter;
use crate::retry::RetryPolicy;
use crate::scoring::ScoringEngine;
use crate::tasks::generate_tasks;
use crate::throttle::SourceThrottle;
use crate::traits::{JobSource, ListingStore};

/// Lifecycle of a single run. Phases advance strictly forward; `Done` is
/// reached even when every task fails, since task failures are recorded
/// per task rather than aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    TasksGenerated,
    Executing,
    Aggregating,
    Persisting,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::TasksGenerated => "tasks_generated",
            RunPhase::Executing => "executing",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Persisting => "persisting",
            RunPhase::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finished run: the report plus every unique listing that survived the
/// post-filter, score-descending. Callers that export CSVs partition this
/// by the relevance threshold; the persisted set is the relevant slice.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub listings: Vec<Listing>,
}

/// Orchestrates one search run end to end against an immutable config
/// snapshot. Build a fresh service per run to pick up config changes.
#[derive(Clone)]
pub struct SearchService<S: JobSource, St: ListingStore> {
    config: AppConfig,
    source: S,
    store: St,
    throttle: SourceThrottle,
    retry: RetryPolicy,
    scoring: ScoringEngine,
    filter: Option<PostFilter>,
}

impl<S: JobSource, St: ListingStore> SearchService<S, St> {
    pub fn new(config: AppConfig, source: S, store: St) -> Self {
        let throttle = SourceThrottle::new(config.throttle.clone());
        let retry = RetryPolicy::from_config(&config.retry);
        let scoring = ScoringEngine::new(&config.scoring);
        let filter = PostFilter::from_config(&config.post_filter);
        Self {
            config,
            source,
            store,
            throttle,
            retry,
            scoring,
            filter,
        }
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    /// Execute one full run.
    ///
    /// Task-level failures are counted and reported, never propagated; the
    /// only errors surfaced here are store failures while persisting.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunOutcome, AppError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut phase = RunPhase::Idle;
        info!(run_id = %run_id, phase = %phase, "starting search run");

        let tasks = generate_tasks(&self.config.search);
        phase = RunPhase::TasksGenerated;
        info!(run_id = %run_id, phase = %phase, tasks = tasks.len(), "generated search tasks");
        if tasks.is_empty() {
            warn!(run_id = %run_id, "no tasks to run, check queries and locations");
        }

        phase = RunPhase::Executing;
        info!(
            run_id = %run_id,
            phase = %phase,
            workers = self.config.executor.max_workers,
            "dispatching tasks"
        );
        let executor = SearchExecutor::new(
            self.source.clone(),
            self.throttle.clone(),
            self.retry.clone(),
            self.config.fetch.clone(),
            cancel.clone(),
        );

        let mut stats = RunStats {
            total: tasks.len(),
            ..RunStats::default()
        };
        let mut total_found = 0usize;
        let mut dropped_by_filter = 0usize;
        let dedup = DedupSet::new();
        let mut listings: Vec<Listing> = Vec::new();

        let mut results = Box::pin(executor.run(tasks, self.config.executor.max_workers));
        while let Some(result) = results.next().await {
            match result.outcome {
                TaskOutcome::Fetched(raw_listings) => {
                    stats.succeeded += 1;
                    total_found += raw_listings.len();
                    for raw in raw_listings {
                        let identity = raw.identity();
                        if !dedup.offer(&identity) {
                            continue;
                        }
                        if let Some(filter) = &self.filter {
                            if !filter.passes(&raw, &result.task) {
                                dropped_by_filter += 1;
                                continue;
                            }
                        }
                        let score = self.scoring.score_listing(&raw);
                        debug!(
                            run_id = %run_id,
                            title = %raw.title,
                            company = %raw.company,
                            score,
                            "scored listing"
                        );
                        listings.push(Listing {
                            identity,
                            relevance_score: score,
                            origin_query: result.task.query.clone(),
                            origin_location: result.task.location.clone(),
                            raw,
                        });
                    }
                }
                TaskOutcome::Failed(err) => {
                    stats.failed += 1;
                    warn!(run_id = %run_id, task = %result.task, error = %err, "task failed");
                }
                TaskOutcome::Skipped => {
                    stats.skipped += 1;
                }
            }
        }
        let unique = dedup.len();

        phase = RunPhase::Aggregating;
        info!(
            run_id = %run_id,
            phase = %phase,
            found = total_found,
            unique,
            dropped = dropped_by_filter,
            "aggregating results"
        );
        listings.sort_by(|a, b| {
            b.relevance_score
                .cmp(&a.relevance_score)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        let relevant: Vec<Listing> = listings
            .iter()
            .filter(|l| self.scoring.is_relevant(l.relevance_score))
            .cloned()
            .collect();

        phase = RunPhase::Persisting;
        info!(
            run_id = %run_id,
            phase = %phase,
            relevant = relevant.len(),
            "persisting relevant listings"
        );
        let today = Utc::now().date_naive();
        let counts = self.store.batch_upsert(&relevant, today).await?;

        let avg_score = if relevant.is_empty() {
            0.0
        } else {
            relevant.iter().map(|l| f64::from(l.relevance_score)).sum::<f64>()
                / relevant.len() as f64
        };

        phase = RunPhase::Done;
        let duration = clock.elapsed();
        info!(
            run_id = %run_id,
            phase = %phase,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            created = counts.created,
            updated = counts.updated,
            elapsed_secs = duration.as_secs(),
            "run finished"
        );

        Ok(RunOutcome {
            report: RunReport {
                run_id,
                started_at,
                duration,
                tasks: stats,
                total_found,
                unique,
                dropped_by_filter,
                relevant: relevant.len(),
                created: counts.created as usize,
                updated: counts.updated as usize,
                avg_score,
            },
            listings,
        })
    }
}
