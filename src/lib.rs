//! # Analysis Batch
//!
//! Concurrency-bounded, cancellable batch processing of DAW media items
//! through pluggable audio-analysis algorithms.
//!
//! ## Features
//!
//! - **Bounded concurrency**: at most N jobs run at once (hardware
//!   parallelism by default), admitted in selection order
//! - **Tick-driven**: [`BatchScheduler::tick()`] is cheap and never waits on
//!   an algorithm, which runs on its own worker thread by default; call it
//!   from any host idle loop, timer or test harness
//! - **Rate-limited finalization**: exactly one finished job mutates host
//!   state per tick, keeping the host UI responsive for large batches
//! - **Cooperative cancellation**: one tick drains every queue and closes the
//!   undo scope
//! - **Monotonic progress**: aggregate progress never moves backwards
//! - **Partial-failure tolerance**: a failing item never aborts its batch
//! - **Debounced auto-processing**: [`AutoProcessTrigger`] coalesces rapid
//!   parameter edits into one run
//!
//! ## Quick Start
//!
//! 1. Implement [`MediaHost`] for your host application
//! 2. Register algorithms (built-in or your own [`Algorithm`]) in an
//!    [`AnalysisSession`]
//! 3. Call [`AnalysisSession::process()`] on user action
//! 4. Call [`AnalysisSession::tick()`] from the host's idle loop
//!
//! See the `demos/` directory for complete usage examples.

pub mod algorithms;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod job;
pub mod params;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod trigger;
pub mod types;

pub use algorithms::{AlgorithmRegistry, AmpGateAlgorithm, AmpSliceAlgorithm};
pub use config::{JobExecutor, SchedulerConfig, SchedulerConfigBuilder};
pub use error::{HostError, ProcessingError, SettingsError};
pub use events::{
    BatchEvent, BatchFinishedEvent, BatchProgressEvent, BatchStartedEvent, ItemFailedEvent,
};
pub use host::{BatchObserver, HostContext, MediaHost, NoopObserver, UndoHandle};
pub use job::{FinalizeOutcome, ProcessingJob};
pub use params::{ParamKind, ParamRange, ParamSpec, ParameterBank};
pub use scheduler::BatchScheduler;
pub use session::AnalysisSession;
pub use settings::Settings;
pub use trigger::AutoProcessTrigger;
pub use types::{
    AlgorithmOutput, AudioBuffer, BatchOutcome, BatchSnapshot, BatchSummary, ItemInfo,
    JobState, MediaItemRef, ProcessingMode,
};

use std::sync::Arc;

use job::JobShared;

/// Handle given to an algorithm while it runs.
///
/// Lets the algorithm report progress and check for cooperative
/// cancellation. Long-running algorithms should poll
/// [`is_cancelled()`](Self::is_cancelled) and bail out early.
#[derive(Clone)]
pub struct AlgorithmContext {
    pub(crate) shared: Arc<JobShared>,
}

impl AlgorithmContext {
    /// A context not attached to any job, for running an algorithm directly.
    pub fn detached() -> Self {
        Self {
            shared: Arc::new(JobShared::new()),
        }
    }

    /// Report progress in `[0, 1]`. Values below the last report are ignored.
    pub fn report_progress(&self, progress: f64) {
        self.shared.report_progress(progress);
    }

    /// Report progress as `current` of `total` steps.
    pub fn report_steps(&self, current: usize, total: usize) {
        if total > 0 {
            self.report_progress(current as f64 / total as f64);
        }
    }

    /// Check if the owning job has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Last reported progress.
    pub fn progress(&self) -> f64 {
        self.shared.progress()
    }
}

/// An audio-analysis algorithm the scheduler can run over media items.
///
/// The scheduler depends only on this capability set, never on concrete
/// algorithm types.
///
/// # Example
///
/// ```
/// use analysis_batch::*;
///
/// struct EverySecond;
///
/// impl Algorithm for EverySecond {
///     fn name(&self) -> &str {
///         "Every Second"
///     }
///
///     fn parameters(&self) -> Vec<ParamSpec> {
///         Vec::new()
///     }
///
///     fn supports_segmentation(&self) -> bool {
///         true
///     }
///
///     fn process(
///         &self,
///         source: &AudioBuffer,
///         _params: &[f64],
///         ctx: &AlgorithmContext,
///     ) -> anyhow::Result<AlgorithmOutput> {
///         let rate = source.sample_rate as usize;
///         let slices = (rate..source.frames()).step_by(rate.max(1)).map(|s| s as f64).collect();
///         ctx.report_progress(1.0);
///         Ok(AlgorithmOutput::Slices(slices))
///     }
/// }
///
/// let out = EverySecond
///     .process(&AudioBuffer::silent(10, 1, 35), &[], &AlgorithmContext::detached())
///     .unwrap();
/// assert_eq!(out, AlgorithmOutput::Slices(vec![10.0, 20.0, 30.0]));
/// ```
pub trait Algorithm: Send + Sync {
    /// Display name, also used as the settings key prefix.
    fn name(&self) -> &str;

    /// Parameters this algorithm reads, in order. Registering the algorithm
    /// reserves a contiguous range for them.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Whether the Segment mode (take markers) is offered.
    fn supports_segmentation(&self) -> bool {
        false
    }

    /// Whether the Regions mode is offered.
    fn supports_regions(&self) -> bool {
        false
    }

    /// Whether the algorithm renders new takes (ProcessAudio mode).
    fn creates_takes(&self) -> bool {
        false
    }

    /// Run the analysis. `params` holds this algorithm's parameter values in
    /// the order of [`parameters()`](Self::parameters).
    fn process(
        &self,
        source: &AudioBuffer,
        params: &[f64],
        ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput>;
}
