//! Crawl orchestrator - main crawl orchestration logic
//!
//! This module drives one crawl from start to finish:
//! - Loading and validating the checkpoint left by an earlier run
//! - Partitioning the query's time range into windows under the platform cap
//! - Draining windows through a bounded worker pool
//! - Deduplicating records and forwarding new ones to the sink
//! - Checkpointing after every window and on interruption
//!
//! All crawl state lives behind one mutex shared by the workers. Fetching
//! happens outside the lock; admitting a page, appending it to the sink and
//! recording window outcomes happen inside it.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{Cursor, FetchSettings, PageFetcher};
use crate::crawler::partitioner::WindowPartitioner;
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::transport::Transport;
use crate::model::{Partition, Query, Record};
use crate::output::{CrawlReport, Sink};
use crate::state::{CrawlPhase, CrawlState, WindowStatus};
use crate::storage::RunStatus;
use crate::{FetchError, SweepError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// State shared between the orchestrator and its window workers
struct Shared<S> {
    state: CrawlState,
    sink: S,
    /// A window failed under the abort policy
    aborted: bool,
}

fn lock<S>(shared: &Mutex<Shared<S>>) -> MutexGuard<'_, Shared<S>> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Orchestration knobs taken from the crawler configuration
#[derive(Debug, Clone)]
struct DrainPolicy {
    min_granularity: Duration,
    fanout: u32,
    max_concurrent_windows: usize,
    abort_on_window_failure: bool,
}

/// Drives a crawl of one query through partitioning and draining
pub struct CrawlOrchestrator<T, S> {
    query: Query,
    policy: DrainPolicy,
    fetcher: Arc<PageFetcher<T>>,
    shared: Arc<Mutex<Shared<S>>>,
    cancel: CancellationToken,
    phase: CrawlPhase,
}

impl<T, S> CrawlOrchestrator<T, S>
where
    T: Transport + 'static,
    S: Sink + 'static,
{
    /// Creates an orchestrator in the idle phase
    ///
    /// # Arguments
    ///
    /// * `query` - The logical query; its time window, if any, is partitioned
    /// * `config` - Crawler limits, pacing and failure policy
    /// * `connection_field` - GraphQL field holding the result connection
    /// * `transport` - Sends page requests
    /// * `sink` - Receives records and checkpoints
    pub fn new(
        query: Query,
        config: &CrawlerConfig,
        connection_field: &str,
        transport: T,
        sink: S,
    ) -> Self {
        let cancel = CancellationToken::new();
        let limiter = Arc::new(RateLimiter::from_config(config));
        let fetcher = PageFetcher::new(
            transport,
            limiter,
            FetchSettings::from_config(config, connection_field),
            cancel.clone(),
        );

        let shared = Shared {
            state: CrawlState::new(query.fingerprint()),
            sink,
            aborted: false,
        };

        Self {
            query,
            policy: DrainPolicy {
                min_granularity: config.min_window_granularity(),
                fanout: config.partition_fanout,
                max_concurrent_windows: config.max_concurrent_windows.max(1) as usize,
                abort_on_window_failure: config.abort_on_window_failure,
            },
            fetcher: Arc::new(fetcher),
            shared: Arc::new(Mutex::new(shared)),
            cancel,
            phase: CrawlPhase::Idle,
        }
    }

    /// Token that stops the crawl when cancelled
    ///
    /// No new page requests are issued after cancellation; requests already
    /// on the wire finish or time out. Partially drained windows stay pending.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), SweepError> {
        if !self.phase.can_transition_to(next) {
            return Err(SweepError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Crawl phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Runs the crawl until every window is drained, it is cancelled, or it aborts
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl completed, was interrupted, or aborted
    ///   under the abort policy; the report's phase and status tell which
    /// * `Err(SweepError)` - The checkpoint belongs to another query, or the
    ///   sink could not persist records or checkpoints
    pub async fn run(&mut self) -> Result<CrawlReport, SweepError> {
        let started = Instant::now();
        tracing::info!("Starting crawl: {}", self.query);

        let mut state = match self.restore_state()? {
            Some(state) => state,
            None => {
                self.transition(CrawlPhase::Completed)?;
                let guard = lock(&self.shared);
                tracing::info!(
                    "Checkpoint shows this crawl already completed ({} records); nothing to do",
                    guard.state.total_emitted()
                );
                return Ok(CrawlReport::from_state(&guard.state, self.phase)
                    .with_elapsed(started.elapsed()));
            }
        };
        state.set_status(RunStatus::Running);

        if !state.has_windows() {
            if self.query.time_window().is_some() {
                self.transition(CrawlPhase::Partitioning)?;
            }
            match self.plan_windows().await {
                Ok(windows) => state.set_windows(windows),
                Err(FetchError::Cancelled) => {
                    tracing::info!("Crawl cancelled during partitioning");
                    state.set_status(RunStatus::Interrupted);
                    let report = CrawlReport::from_state(&state, self.phase);
                    lock(&self.shared).state = state;
                    return Ok(report.with_elapsed(started.elapsed()));
                }
                Err(e) => {
                    self.transition(CrawlPhase::Failed)?;
                    return Err(e.into());
                }
            }
        }

        {
            let mut guard = lock(&self.shared);
            guard.state = state;
            let Shared { state, sink, .. } = &mut *guard;
            sink.save_checkpoint(state)?;
        }

        self.transition(CrawlPhase::Draining)?;
        let fatal = self.drain().await;
        self.finish(fatal, started.elapsed())
    }

    /// Loads the checkpoint and decides what to resume
    ///
    /// Returns None when the stored crawl already completed without failed
    /// windows; that state is left in place for the report.
    fn restore_state(&mut self) -> Result<Option<CrawlState>, SweepError> {
        let fingerprint = self.query.fingerprint();
        let mut guard = lock(&self.shared);

        let Some(mut state) = guard.sink.load_checkpoint()? else {
            let visited = guard.sink.emitted_ids()?;
            if visited.is_empty() {
                tracing::info!("No checkpoint found, starting a new crawl");
            } else {
                tracing::warn!(
                    "No checkpoint found, but the sink already holds {} record(s); they will not be emitted again",
                    visited.len()
                );
            }
            return Ok(Some(CrawlState::restore(
                fingerprint,
                RunStatus::Running,
                visited,
                Vec::new(),
            )));
        };

        if state.fingerprint() != fingerprint {
            return Err(SweepError::CheckpointMismatch {
                stored: state.fingerprint().to_string(),
                current: fingerprint,
            });
        }

        if state.status() == RunStatus::Completed && state.count_windows(WindowStatus::Failed) == 0
        {
            guard.state = state;
            return Ok(None);
        }

        let requeued = state.requeue_failed();
        tracing::info!(
            "Resuming crawl: {} pending window(s), {} record(s) already emitted",
            state.count_windows(WindowStatus::Pending),
            state.total_emitted()
        );
        if requeued > 0 {
            tracing::info!("Retrying {} previously failed window(s)", requeued);
        }
        Ok(Some(state))
    }

    /// Produces the window list: partitioned when the query is time-bounded,
    /// a single unbounded window otherwise
    async fn plan_windows(&self) -> Result<Vec<Partition>, FetchError> {
        let Some(range) = self.query.time_window() else {
            tracing::info!("No time window configured, draining a single unbounded query");
            return Ok(vec![Partition::unbounded()]);
        };

        let partitioner = WindowPartitioner::new(
            self.fetcher.as_ref(),
            self.policy.min_granularity,
            self.policy.fanout,
        );
        let windows = partitioner.partition(&self.query, range).await?;
        Ok(windows.into_iter().map(Partition::from).collect())
    }

    /// Drains every pending window through the worker pool
    ///
    /// Returns the first fatal error any worker hit.
    async fn drain(&mut self) -> Option<SweepError> {
        let pending = lock(&self.shared).state.pending_windows();
        tracing::info!(
            "Draining {} window(s) with up to {} worker(s)",
            pending.len(),
            self.policy.max_concurrent_windows
        );

        let semaphore = Arc::new(Semaphore::new(self.policy.max_concurrent_windows));
        let mut tasks = JoinSet::new();
        let mut fatal = None;

        for partition in pending {
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        fatal = Some(SweepError::Worker(e.to_string()));
                        self.cancel.cancel();
                        break;
                    }
                },
            };
            if self.cancel.is_cancelled() {
                break;
            }

            let worker = WindowWorker {
                query: self.query.restricted_to(partition.range),
                partition,
                fetcher: Arc::clone(&self.fetcher),
                shared: Arc::clone(&self.shared),
                abort_on_failure: self.policy.abort_on_window_failure,
                cancel: self.cancel.clone(),
            };
            tasks.spawn(async move {
                let _permit = permit;
                let cancel = worker.cancel.clone();
                let result = worker.drain().await;
                if result.is_err() {
                    cancel.cancel();
                }
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => {
                    self.cancel.cancel();
                    SweepError::Worker(e.to_string())
                }
            };
            tracing::error!("Window worker stopped the crawl: {}", error);
            fatal.get_or_insert(error);
        }

        fatal
    }

    /// Settles the final phase and status, checkpoints, and builds the report
    fn finish(
        &mut self,
        fatal: Option<SweepError>,
        elapsed: Duration,
    ) -> Result<CrawlReport, SweepError> {
        let mut guard = lock(&self.shared);
        let Shared {
            state,
            sink,
            aborted,
        } = &mut *guard;

        let pending = state.count_windows(WindowStatus::Pending);
        let (next_phase, status) = if fatal.is_some() || *aborted {
            (Some(CrawlPhase::Failed), RunStatus::Failed)
        } else if pending > 0 || self.cancel.is_cancelled() {
            (None, RunStatus::Interrupted)
        } else {
            (Some(CrawlPhase::Completed), RunStatus::Completed)
        };
        state.set_status(status);

        let saved = sink.save_checkpoint(state).and_then(|_| sink.flush());
        let report = CrawlReport::from_state(state, next_phase.unwrap_or(self.phase))
            .with_elapsed(elapsed);
        drop(guard);

        if let Some(next) = next_phase {
            self.transition(next)?;
        }

        if let Some(error) = fatal {
            if let Err(e) = saved {
                tracing::warn!("Could not save checkpoint after fatal error: {}", e);
            }
            return Err(error);
        }
        saved?;

        tracing::info!(
            "Crawl {}: {} records emitted, {} window(s) completed, {} failed, {} truncated, {} pending in {:.1}s",
            status.to_db_string(),
            report.total_emitted,
            report.windows_completed,
            report.windows_failed,
            report.windows_truncated,
            report.windows_pending,
            elapsed.as_secs_f64()
        );
        if report.windows_failed > 0 {
            tracing::warn!(
                "{} window(s) failed; run again to retry them",
                report.windows_failed
            );
        }

        Ok(report)
    }
}

/// Drains one window, page by page
struct WindowWorker<T, S> {
    query: Query,
    partition: Partition,
    fetcher: Arc<PageFetcher<T>>,
    shared: Arc<Mutex<Shared<S>>>,
    abort_on_failure: bool,
    cancel: CancellationToken,
}

impl<T: Transport, S: Sink> WindowWorker<T, S> {
    /// Fetches pages until the window is exhausted
    ///
    /// A fetch failure marks the window failed and returns Ok; only sink
    /// failures are returned as errors. A cancelled window is left pending.
    async fn drain(self) -> Result<(), SweepError> {
        tracing::debug!("Draining window {}", self.partition);

        let mut cursor: Option<Cursor> = None;
        let mut truncated = false;
        let mut fetched = 0usize;
        let mut emitted = 0usize;

        loop {
            let page = match self.fetcher.fetch(&self.query, cursor.as_ref()).await {
                Ok(page) => page,
                Err(FetchError::Cancelled) => {
                    tracing::debug!(
                        "Window {} interrupted after {} record(s)",
                        self.partition,
                        fetched
                    );
                    return Ok(());
                }
                Err(error) => return self.fail(error),
            };

            truncated |= page.hit_platform_cap;
            fetched += page.records.len();
            emitted += self.emit(page.records)?;

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let mut guard = lock(&self.shared);
        let Shared { state, sink, .. } = &mut *guard;
        state.mark_completed(&self.partition, truncated);
        sink.save_checkpoint(state)?;
        drop(guard);

        if truncated {
            tracing::warn!(
                "Window {} reached the platform cap while draining; results may be truncated",
                self.partition
            );
        }
        tracing::info!(
            "Window {} complete: {} fetched, {} new",
            self.partition,
            fetched,
            emitted
        );
        Ok(())
    }

    /// Admits a page's records and forwards the new ones to the sink
    fn emit(&self, mut records: Vec<Record>) -> Result<usize, SweepError> {
        for record in &mut records {
            record.source_window = self.partition.range;
        }

        let mut guard = lock(&self.shared);
        let Shared { state, sink, .. } = &mut *guard;
        let admitted = state.admit(records);
        if admitted.is_empty() {
            return Ok(0);
        }

        if let Err(e) = sink.append(&admitted) {
            state.retract(&admitted);
            return Err(e.into());
        }
        state.confirm_emitted(admitted.len());
        Ok(admitted.len())
    }

    fn fail(&self, error: FetchError) -> Result<(), SweepError> {
        tracing::warn!("Window {} failed: {}", self.partition, error);

        let mut guard = lock(&self.shared);
        let Shared {
            state,
            sink,
            aborted,
        } = &mut *guard;
        state.mark_failed(&self.partition, error.to_string());
        if self.abort_on_failure {
            tracing::error!("Aborting crawl after window {} failed", self.partition);
            *aborted = true;
            self.cancel.cancel();
        }
        sink.save_checkpoint(state)?;
        Ok(())
    }
}
