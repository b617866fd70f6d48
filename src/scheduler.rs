//! The tick-driven batch scheduler.
//!
//! Each [`BatchScheduler::tick()`] does a bounded amount of work: drain
//! finished jobs, admit new ones up to the concurrency limit, finalize at
//! most one job, publish progress and close the batch once everything has
//! drained. Nothing here blocks on a job.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::algorithms::AlgorithmRegistry;
use crate::config::SchedulerConfig;
use crate::error::{ProcessingError, Result};
use crate::events::{
    BatchEvent, BatchFinishedEvent, BatchProgressEvent, BatchStartedEvent, ItemFailedEvent,
};
use crate::host::{HostContext, UndoHandle};
use crate::job::{FinalizeOutcome, ProcessingJob};
use crate::params::ParameterBank;
use crate::types::{
    BatchOutcome, BatchSnapshot, BatchSummary, MediaItemRef, ProcessingMode,
};
use crate::Algorithm;

/// Everything fixed when a batch starts.
struct BatchRun {
    id: String,
    mode: ProcessingMode,
    algorithm: Arc<dyn Algorithm>,
    params: Vec<f64>,
    undo: UndoHandle,
    concurrency: usize,
    started_at: String,
    started: Instant,
}

/// Bounded-concurrency scheduler over the selected media items.
///
/// Owns the pending queue, the active job set and the finalize queue. Between
/// ticks `pending + active + finalizing + completed == total` always holds.
pub struct BatchScheduler {
    ctx: HostContext,
    config: SchedulerConfig,
    run: Option<BatchRun>,
    pending: VecDeque<MediaItemRef>,
    active: Vec<ProcessingJob>,
    finalize: VecDeque<ProcessingJob>,
    completed: usize,
    succeeded: usize,
    failed: usize,
    total: usize,
    progress: f64,
    cancel_requested: bool,
    last_summary: Option<BatchSummary>,
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("snapshot", &self.snapshot())
            .field("cancel_requested", &self.cancel_requested)
            .finish()
    }
}

impl BatchScheduler {
    pub fn new(ctx: HostContext, config: SchedulerConfig) -> Self {
        Self {
            ctx,
            config,
            run: None,
            pending: VecDeque::new(),
            active: Vec::new(),
            finalize: VecDeque::new(),
            completed: 0,
            succeeded: 0,
            failed: 0,
            total: 0,
            progress: 0.0,
            cancel_requested: false,
            last_summary: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether a batch is in progress (including one waiting to be cancelled).
    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Last published aggregate progress of the current (or last) batch.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            active_batch: self.is_active(),
            pending: self.pending.len(),
            active: self.active.len(),
            finalizing: self.finalize.len(),
            completed: self.completed,
            total: self.total,
            progress: self.progress,
        }
    }

    /// Summary of the most recently closed batch.
    pub fn last_summary(&self) -> Option<&BatchSummary> {
        self.last_summary.as_ref()
    }

    /// Begin a batch over the host's current selection with the registry's
    /// active algorithm.
    ///
    /// With an empty selection or no active algorithm nothing changes: no
    /// undo scope is opened and the error is returned for the caller to
    /// ignore or report. A batch still in progress is cancelled first.
    pub fn start(
        &mut self,
        mode: ProcessingMode,
        registry: &AlgorithmRegistry,
        bank: &ParameterBank,
    ) -> Result<()> {
        let items = self.ctx.host.selected_items();
        let Some(&anchor) = items.first() else {
            log::debug!("start: empty selection, nothing to do");
            return Err(ProcessingError::EmptySelection);
        };
        let Some(algorithm) = registry.active().cloned() else {
            log::debug!("start: no active algorithm");
            return Err(ProcessingError::NoActiveAlgorithm);
        };

        if self.is_active() {
            log::warn!("start: replacing a batch that is still in progress");
            self.cancel_now();
        }

        self.pending = items.into_iter().collect();
        self.active.clear();
        self.finalize.clear();
        self.total = self.pending.len();
        self.completed = 0;
        self.succeeded = 0;
        self.failed = 0;
        self.progress = 0.0;
        self.cancel_requested = false;

        let run = BatchRun {
            id: uuid::Uuid::new_v4().to_string(),
            mode,
            params: registry.active_params(bank),
            algorithm,
            undo: self.ctx.host.begin_undo(anchor),
            concurrency: self.config.effective_concurrency(),
            started_at: chrono::Utc::now().to_rfc3339(),
            started: Instant::now(),
        };

        log::info!(
            "batch {} started: {} items, {} mode, {} (concurrency {})",
            run.id,
            self.total,
            mode.as_str(),
            run.algorithm.name(),
            run.concurrency
        );

        self.ctx.observer.set_controls_enabled(false);
        self.ctx.observer.set_cancel_enabled(true);
        self.ctx.emit(BatchEvent::Started(BatchStartedEvent {
            batch_id: run.id.clone(),
            mode,
            algorithm: run.algorithm.name().to_string(),
            total_items: self.total,
            concurrency_limit: run.concurrency,
        }));
        self.ctx.emit(BatchEvent::Progress(BatchProgressEvent {
            batch_id: run.id.clone(),
            progress: 0.0,
            completed: 0,
            total: self.total,
        }));

        self.run = Some(run);
        Ok(())
    }

    /// Ask the next tick to cancel the batch. Idempotent and non-blocking.
    ///
    /// The cancel affordance is disabled right away.
    pub fn request_cancellation(&mut self) {
        if !self.is_active() || self.cancel_requested {
            return;
        }
        log::info!("batch cancellation requested");
        self.cancel_requested = true;
        self.ctx.observer.set_cancel_enabled(false);
    }

    /// Advance the batch by one step. Never waits on a running job; with
    /// [`JobExecutor::Inline`](crate::JobExecutor::Inline) newly admitted
    /// algorithms run inside this call.
    pub fn tick(&mut self) {
        if !self.is_active() {
            return;
        }

        if self.cancel_requested {
            self.cancel_now();
            return;
        }

        self.drain_finished();
        self.admit();
        self.finalize_one();
        self.publish_progress();

        if self.pending.is_empty() && self.active.is_empty() && self.finalize.is_empty() {
            self.close(false);
        }
    }

    /// Cancel the batch synchronously: cancel every running job, drop all
    /// queued work and close the undo scope as cancelled.
    pub fn cancel_now(&mut self) {
        if !self.is_active() {
            return;
        }
        for job in self.active.iter_mut() {
            job.cancel();
        }
        log::info!(
            "batch cancelled: {} running, {} pending, {} awaiting finalize",
            self.active.len(),
            self.pending.len(),
            self.finalize.len()
        );
        self.close(true);
    }

    fn drain_finished(&mut self) {
        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].is_finished() {
                let job = self.active.remove(i);
                log::trace!("{} finished, queued for finalize", job.item());
                self.finalize.push_back(job);
            } else {
                i += 1;
            }
        }
    }

    fn admit(&mut self) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        while self.active.len() < run.concurrency {
            let Some(item) = self.pending.pop_front() else {
                break;
            };
            let mut job = ProcessingJob::new(
                item,
                Arc::clone(&run.algorithm),
                run.params.clone(),
                run.mode,
                Arc::clone(&self.ctx.host),
                self.config.executor.clone(),
            );
            // A failed start leaves the job finished with the failure
            // recorded. It drains and is skipped like any other failure.
            if let Err(e) = job.start() {
                log::warn!("{} could not start: {}", item, e);
            }
            self.active.push(job);
        }
    }

    fn finalize_one(&mut self) {
        let Some(mut job) = self.finalize.pop_front() else {
            return;
        };
        let item = job.item();
        let error = match job.finalize() {
            Ok(FinalizeOutcome::Applied { mode, count }) => {
                log::debug!("{} finalized: {} {} result(s)", item, count, mode.as_str());
                None
            }
            Ok(FinalizeOutcome::Skipped(e)) => Some(e),
            Err(e) => {
                log::error!("{} could not be finalized: {}", item, e);
                Some(e)
            }
        };

        self.completed += 1;
        match error {
            None => self.succeeded += 1,
            Some(e) => {
                self.failed += 1;
                if let Some(run) = self.run.as_ref() {
                    self.ctx.emit(BatchEvent::ItemFailed(ItemFailedEvent {
                        batch_id: run.id.clone(),
                        item,
                        error: e.to_string(),
                    }));
                }
            }
        }
    }

    /// Aggregate progress: running jobs contribute their own progress,
    /// finished jobs awaiting finalize and finalized jobs count as done.
    fn publish_progress(&mut self) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        if self.total == 0 {
            return;
        }
        let in_flight: f64 = self.active.iter().map(ProcessingJob::progress).sum();
        let done = (self.finalize.len() + self.completed) as f64;
        let current = ((in_flight + done) / self.total as f64).clamp(0.0, 1.0);
        self.progress = self.progress.max(current);

        self.ctx.emit(BatchEvent::Progress(BatchProgressEvent {
            batch_id: run.id.clone(),
            progress: self.progress,
            completed: self.completed,
            total: self.total,
        }));
    }

    fn close(&mut self, cancelled: bool) {
        let Some(run) = self.run.take() else {
            return;
        };
        let dropped = self.pending.len() + self.active.len() + self.finalize.len();
        self.pending.clear();
        self.active.clear();
        self.finalize.clear();
        self.cancel_requested = false;

        let label = if cancelled {
            &self.config.cancelled_undo_label
        } else {
            &self.config.completed_undo_label
        };
        self.ctx.host.end_undo(run.undo, label);

        let outcome = if cancelled {
            BatchOutcome::Cancelled
        } else if self.failed > 0 {
            BatchOutcome::CompletedWithErrors
        } else {
            BatchOutcome::Completed
        };
        let summary = BatchSummary {
            batch_id: run.id,
            mode: run.mode,
            algorithm: run.algorithm.name().to_string(),
            outcome,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled: dropped,
            started_at: run.started_at,
            completed_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: run.started.elapsed().as_millis() as u64,
        };

        log::info!(
            "batch {} closed ({:?}): {} succeeded, {} failed, {} cancelled in {}ms",
            summary.batch_id,
            summary.outcome,
            summary.succeeded,
            summary.failed,
            summary.cancelled,
            summary.duration_ms
        );

        self.ctx.observer.set_cancel_enabled(false);
        self.ctx.observer.set_controls_enabled(true);
        self.ctx.emit(BatchEvent::Finished(BatchFinishedEvent {
            summary: summary.clone(),
        }));
        self.ctx.host.refresh_views();
        self.last_summary = Some(summary);
    }
}
