//! A single media item's run of an algorithm.
//!
//! The job reads the item's source on the tick thread, runs the algorithm
//! on a worker thread (or the runtime's blocking pool), and later applies the result
//! to the host in [`ProcessingJob::finalize`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::JobExecutor;
use crate::error::{HostError, ProcessingError, Result};
use crate::host::{ItemLock, MediaHost};
use crate::types::{AlgorithmOutput, AudioBuffer, JobState, MediaItemRef, ProcessingMode};
use crate::{Algorithm, AlgorithmContext};

type Outcome = std::result::Result<AlgorithmOutput, ProcessingError>;

/// State shared between a job and the worker running its algorithm.
pub(crate) struct JobShared {
    /// f64 bits. Non-negative floats order the same as their bit patterns,
    /// so `fetch_max` keeps progress monotonic.
    progress: AtomicU64,
    cancelled: AtomicBool,
    outcome: Mutex<Option<Outcome>>,
}

impl JobShared {
    pub(crate) fn new() -> Self {
        Self {
            progress: AtomicU64::new(0f64.to_bits()),
            cancelled: AtomicBool::new(false),
            outcome: Mutex::new(None),
        }
    }

    pub(crate) fn report_progress(&self, progress: f64) {
        if progress.is_nan() {
            return;
        }
        let p = progress.clamp(0.0, 1.0);
        self.progress.fetch_max(p.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Record the terminal outcome. Only the first call has an effect.
    fn complete(&self, outcome: Outcome) {
        match self.outcome.lock() {
            Ok(mut slot) => {
                if slot.is_none() {
                    *slot = Some(outcome);
                }
            }
            Err(e) => log::error!("job outcome mutex poisoned: {}", e),
        }
    }

    fn is_complete(&self) -> bool {
        // A poisoned slot can never be filled, treat it as a terminal failure.
        self.outcome.lock().map(|o| o.is_some()).unwrap_or(true)
    }

    fn take_outcome(&self) -> Outcome {
        match self.outcome.lock() {
            Ok(mut slot) => slot.take().unwrap_or_else(|| {
                Err(ProcessingError::AlgorithmFailure(
                    "no outcome recorded".to_string(),
                ))
            }),
            Err(_) => Err(ProcessingError::AlgorithmFailure(
                "job outcome lost to a panic".to_string(),
            )),
        }
    }
}

/// Result of [`ProcessingJob::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// The result was written to the host. `count` is the number of markers,
    /// regions or takes created.
    Applied { mode: ProcessingMode, count: usize },
    /// The job failed earlier (or its item vanished); nothing was written.
    Skipped(ProcessingError),
}

/// One media item's execution of the selected algorithm.
pub struct ProcessingJob {
    item: MediaItemRef,
    algorithm: Arc<dyn Algorithm>,
    params: Vec<f64>,
    mode: ProcessingMode,
    host: Arc<dyn MediaHost>,
    executor: JobExecutor,
    state: JobState,
    shared: Arc<JobShared>,
    source_rate: u32,
    cancelled_progress: f64,
    finalized: bool,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for ProcessingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingJob")
            .field("item", &self.item)
            .field("algorithm", &self.algorithm.name())
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}

impl ProcessingJob {
    /// Create a job in the `Created` state. `params` is the algorithm's
    /// parameter snapshot, fixed for the job's lifetime.
    pub fn new(
        item: MediaItemRef,
        algorithm: Arc<dyn Algorithm>,
        params: Vec<f64>,
        mode: ProcessingMode,
        host: Arc<dyn MediaHost>,
        executor: JobExecutor,
    ) -> Self {
        Self {
            item,
            algorithm,
            params,
            mode,
            host,
            executor,
            state: JobState::Created,
            shared: Arc::new(JobShared::new()),
            source_rate: 0,
            cancelled_progress: 0.0,
            finalized: false,
            worker: None,
        }
    }

    pub fn item(&self) -> MediaItemRef {
        self.item
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Current lifecycle state. A running job whose algorithm has produced
    /// an outcome reports `Finished`.
    pub fn state(&self) -> JobState {
        match self.state {
            JobState::Running if self.shared.is_complete() => JobState::Finished,
            s => s,
        }
    }

    /// Begin processing: read the item's source and hand it to the algorithm.
    ///
    /// If the item cannot be read the job becomes `Finished` with a failure
    /// and the error is returned. The host is not mutated either way.
    pub fn start(&mut self) -> Result<()> {
        if self.state != JobState::Created {
            return Err(ProcessingError::InvalidState {
                expected: JobState::Created,
                actual: self.state(),
            });
        }
        let source = match self.read_source() {
            Ok(source) => source,
            Err(e) => {
                self.shared.complete(Err(e.clone()));
                self.state = JobState::Finished;
                return Err(e);
            }
        };
        self.source_rate = source.sample_rate;
        self.state = JobState::Running;

        let algorithm = Arc::clone(&self.algorithm);
        let params = self.params.clone();
        let ctx = AlgorithmContext {
            shared: Arc::clone(&self.shared),
        };

        match &self.executor {
            JobExecutor::Thread => {
                // Detached: cancellation is cooperative through the context.
                let spawned = std::thread::Builder::new()
                    .name(format!("analysis-{}", self.item.0))
                    .spawn(move || run_algorithm(algorithm.as_ref(), &source, &params, &ctx));
                if let Err(e) = spawned {
                    let err = ProcessingError::AlgorithmFailure(format!(
                        "failed to spawn worker thread: {}",
                        e
                    ));
                    self.shared.complete(Err(err.clone()));
                    self.state = JobState::Finished;
                    return Err(err);
                }
            }
            JobExecutor::Inline => run_algorithm(algorithm.as_ref(), &source, &params, &ctx),
            JobExecutor::Runtime(handle) => {
                self.worker = Some(handle.spawn_blocking(move || {
                    run_algorithm(algorithm.as_ref(), &source, &params, &ctx)
                }));
            }
        }
        Ok(())
    }

    fn read_source(&self) -> Result<AudioBuffer> {
        self.host
            .item_info(self.item)
            .and_then(|_| self.host.read_source(self.item))
            .map_err(|e| item_error(self.item, e))
    }

    /// Whether the algorithm has reached a terminal outcome (success or
    /// failure) and the job was not cancelled. Never blocks.
    pub fn is_finished(&self) -> bool {
        self.state() == JobState::Finished
    }

    /// Progress in `[0, 1]`: 0 before start, 1 once finished, frozen once
    /// cancelled.
    pub fn progress(&self) -> f64 {
        match self.state() {
            JobState::Created => 0.0,
            JobState::Running => self.shared.progress(),
            JobState::Finished => 1.0,
            JobState::Cancelled => self.cancelled_progress,
        }
    }

    /// Whether the job finished with a failure. `None` until finished.
    pub fn failed(&self) -> Option<bool> {
        if self.state() != JobState::Finished || self.finalized {
            return None;
        }
        self.shared
            .outcome
            .lock()
            .ok()
            .map(|o| matches!(o.as_ref(), Some(Err(_))))
    }

    /// Request the algorithm stop and mark the job `Cancelled`.
    ///
    /// Idempotent. A no-op once the job has been finalized. The item's edit
    /// lock is released the first time the job is cancelled.
    pub fn cancel(&mut self) {
        if self.finalized || self.state == JobState::Cancelled {
            return;
        }
        self.cancelled_progress = self.progress();
        self.state = JobState::Cancelled;
        self.shared.cancel();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.host.set_item_locked(self.item, false);
        log::debug!("cancelled job for {}", self.item);
    }

    /// Apply the algorithm's result to the host item.
    ///
    /// Fails with [`ProcessingError::InvalidState`] unless the job is
    /// `Finished` and not yet finalized; no host mutation happens then. A
    /// job that finished with a failure finalizes to
    /// [`FinalizeOutcome::Skipped`] without touching the host.
    pub fn finalize(&mut self) -> Result<FinalizeOutcome> {
        let state = self.state();
        if state != JobState::Finished || self.finalized {
            return Err(ProcessingError::InvalidState {
                expected: JobState::Finished,
                actual: state,
            });
        }
        self.finalized = true;
        self.state = JobState::Finished;

        let output = match self.shared.take_outcome() {
            Ok(output) => output,
            Err(e) => return Ok(FinalizeOutcome::Skipped(e)),
        };
        let info = match self.host.item_info(self.item) {
            Ok(info) => info,
            Err(e) => return Ok(FinalizeOutcome::Skipped(item_error(self.item, e))),
        };

        let _lock = ItemLock::acquire(self.host.as_ref(), self.item);
        let applied = match (self.mode, output) {
            (ProcessingMode::Segment, AlgorithmOutput::Slices(slices)) => {
                self.write_markers(&marker_times(&slices, self.source_rate, info.length))
            }
            (ProcessingMode::Regions, AlgorithmOutput::Slices(slices)) => self.write_regions(
                info.position,
                &region_bounds(&slices, self.source_rate, info.length),
            ),
            (ProcessingMode::ProcessAudio, AlgorithmOutput::Audio(buffers)) => {
                self.write_takes(&buffers)
            }
            (mode, _) => Err(ProcessingError::UnsupportedOutput { mode }),
        };

        Ok(match applied {
            Ok(count) => FinalizeOutcome::Applied {
                mode: self.mode,
                count,
            },
            Err(e) => FinalizeOutcome::Skipped(e),
        })
    }

    fn write_markers(&self, times: &[f64]) -> Result<usize> {
        self.host.clear_take_markers(self.item)?;
        for &t in times {
            self.host.add_take_marker(self.item, t)?;
        }
        Ok(times.len())
    }

    fn write_regions(&self, position: f64, bounds: &[(f64, f64)]) -> Result<usize> {
        for (i, &(start, end)) in bounds.iter().enumerate() {
            let name = format!("Region {}", i + 1);
            self.host
                .add_region(self.item, position + start, position + end, &name)?;
        }
        Ok(bounds.len())
    }

    fn write_takes(&self, buffers: &[AudioBuffer]) -> Result<usize> {
        let base = self.algorithm.name();
        for (i, buffer) in buffers.iter().enumerate() {
            let name = if buffers.len() == 1 {
                base.to_string()
            } else {
                format!("{} {}", base, i + 1)
            };
            self.host.add_take(self.item, buffer, &name)?;
        }
        Ok(buffers.len())
    }
}

fn item_error(item: MediaItemRef, err: HostError) -> ProcessingError {
    match err {
        HostError::ItemNotFound(_) => ProcessingError::ItemBecameInvalid(item),
        other => ProcessingError::Host(other),
    }
}

/// Run an algorithm to completion and record its outcome. Panics are caught
/// so a misbehaving algorithm still finishes its job.
fn run_algorithm(
    algorithm: &dyn Algorithm,
    source: &AudioBuffer,
    params: &[f64],
    ctx: &AlgorithmContext,
) {
    let result = catch_unwind(AssertUnwindSafe(|| algorithm.process(source, params, ctx)));
    let outcome = match result {
        Ok(Ok(_)) if ctx.is_cancelled() => Err(ProcessingError::Cancelled),
        Ok(Ok(output)) => {
            ctx.report_progress(1.0);
            Ok(output)
        }
        Ok(Err(e)) => Err(ProcessingError::from(e)),
        Err(_) => Err(ProcessingError::AlgorithmFailure(format!(
            "{} panicked",
            algorithm.name()
        ))),
    };
    if let Err(e) = &outcome {
        log::warn!("{} failed: {}", algorithm.name(), e);
    }
    ctx.shared.complete(outcome);
}

/// Slice positions converted to marker times: strictly positive entries
/// only, inside `(0, item_length)`, sorted and de-duplicated.
pub fn marker_times(slices: &[f64], sample_rate: u32, item_length: f64) -> Vec<f64> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let rate = sample_rate as f64;
    let mut times: Vec<f64> = slices
        .iter()
        .filter(|&&s| s > 0.0)
        .map(|&s| s / rate)
        .filter(|&t| t < item_length)
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

/// Region boundaries from slice positions. The item start and end are always
/// boundaries; each adjacent pair with non-zero length becomes one region.
pub fn region_bounds(slices: &[f64], sample_rate: u32, item_length: f64) -> Vec<(f64, f64)> {
    let mut edges = vec![0.0, item_length];
    edges.extend(marker_times(slices, sample_rate, item_length));
    edges.sort_by(f64::total_cmp);
    edges.dedup();
    edges
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| (w[0], w[1]))
        .collect()
}
