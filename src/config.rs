use std::time::Duration;

/// Default quiet period before an automatic re-run after a parameter change.
pub const DEFAULT_AUTO_PROCESS_DELAY: Duration = Duration::from_millis(50);

/// Where a job's algorithm runs.
#[derive(Debug, Clone, Default)]
pub enum JobExecutor {
    /// Run the algorithm on a dedicated worker thread per job.
    #[default]
    Thread,
    /// Run the algorithm synchronously inside `ProcessingJob::start`.
    /// Blocks the caller for the whole analysis; meant for tests.
    Inline,
    /// Run the algorithm on the runtime's blocking pool. The scheduler only
    /// polls the job for completion.
    Runtime(tokio::runtime::Handle),
}

/// Configuration for the batch scheduler and auto-process trigger.
///
/// Use [`SchedulerConfig::builder()`] for ergonomic construction, or
/// [`SchedulerConfig::default()`] for hardware-sized concurrency, one worker
/// thread per job and a 50ms auto-process delay.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently running jobs. `None` = hardware parallelism.
    pub concurrency_limit: Option<usize>,

    /// Where job algorithms are executed.
    pub executor: JobExecutor,

    /// Debounce delay for automatic processing after parameter edits.
    pub auto_process_delay: Duration,

    /// Undo label used when a batch drains normally.
    pub completed_undo_label: String,

    /// Undo label used when a batch is cancelled.
    pub cancelled_undo_label: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: None,
            executor: JobExecutor::Thread,
            auto_process_delay: DEFAULT_AUTO_PROCESS_DELAY,
            completed_undo_label: "Analysis: Process Batch".to_string(),
            cancelled_undo_label: "Analysis: Batch Process Cancelled".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Resolve the concurrency bound for a new batch. Never returns zero.
    pub fn effective_concurrency(&self) -> usize {
        match self.concurrency_limit {
            Some(limit) => limit.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Cap the number of concurrently running jobs.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = Some(limit);
        self
    }

    /// Run algorithms on the given tokio runtime instead of inline.
    pub fn with_runtime(mut self, handle: tokio::runtime::Handle) -> Self {
        self.config.executor = JobExecutor::Runtime(handle);
        self
    }

    /// Choose where job algorithms run.
    pub fn with_executor(mut self, executor: JobExecutor) -> Self {
        self.config.executor = executor;
        self
    }

    /// Set the debounce delay used by the auto-process trigger.
    pub fn with_auto_process_delay(mut self, delay: Duration) -> Self {
        self.config.auto_process_delay = delay;
        self
    }

    /// Set the undo labels for completed and cancelled batches.
    pub fn with_undo_labels(
        mut self,
        completed: impl Into<String>,
        cancelled: impl Into<String>,
    ) -> Self {
        self.config.completed_undo_label = completed.into();
        self.config.cancelled_undo_label = cancelled.into();
        self
    }

    /// Build the final [`SchedulerConfig`].
    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}
