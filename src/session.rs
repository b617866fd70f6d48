//! The explicit context tying algorithms, parameters, the scheduler and
//! auto-processing together for one host integration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::algorithms::AlgorithmRegistry;
use crate::config::SchedulerConfig;
use crate::error::{ProcessingError, Result, SettingsError};
use crate::host::HostContext;
use crate::params::ParameterBank;
use crate::scheduler::BatchScheduler;
use crate::settings::Settings;
use crate::trigger::AutoProcessTrigger;
use crate::types::{BatchSnapshot, BatchSummary, ProcessingMode};
use crate::Algorithm;

/// One host integration: registered algorithms, their parameters, the batch
/// scheduler and the auto-process trigger.
///
/// Every host mutation happens on the thread that calls [`tick()`](Self::tick).
///
/// # Example
///
/// ```ignore
/// let mut session = AnalysisSession::new(HostContext::new(host, observer), SchedulerConfig::default())
///     .with_settings_path(dir.join("analysis.ini"));
/// session.load_settings()?;
///
/// session.process(ProcessingMode::Segment)?;
/// // from the host idle loop:
/// session.tick(Instant::now());
/// ```
pub struct AnalysisSession {
    bank: ParameterBank,
    registry: AlgorithmRegistry,
    scheduler: BatchScheduler,
    trigger: AutoProcessTrigger,
    settings_path: Option<PathBuf>,
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .field("trigger", &self.trigger)
            .field("settings_path", &self.settings_path)
            .finish()
    }
}

impl AnalysisSession {
    /// Session with the built-in algorithms.
    pub fn new(ctx: HostContext, config: SchedulerConfig) -> Self {
        let mut bank = ParameterBank::new();
        let registry = AlgorithmRegistry::with_builtins(&mut bank);
        Self::from_parts(ctx, config, bank, registry)
    }

    /// Session with a custom set of algorithms, registered in order.
    pub fn with_algorithms(
        ctx: HostContext,
        config: SchedulerConfig,
        algorithms: Vec<Arc<dyn Algorithm>>,
    ) -> Self {
        let mut bank = ParameterBank::new();
        let registry = AlgorithmRegistry::new(algorithms, &mut bank);
        Self::from_parts(ctx, config, bank, registry)
    }

    fn from_parts(
        ctx: HostContext,
        config: SchedulerConfig,
        bank: ParameterBank,
        registry: AlgorithmRegistry,
    ) -> Self {
        let trigger = AutoProcessTrigger::new(config.auto_process_delay);
        Self {
            bank,
            registry,
            scheduler: BatchScheduler::new(ctx, config),
            trigger,
            settings_path: None,
        }
    }

    /// Persist parameters to `path`. Every parameter edit rewrites the file.
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }

    pub fn parameters(&self) -> &ParameterBank {
        &self.bank
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    pub fn trigger(&self) -> &AutoProcessTrigger {
        &self.trigger
    }

    pub fn is_processing(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.scheduler.snapshot()
    }

    pub fn last_summary(&self) -> Option<&BatchSummary> {
        self.scheduler.last_summary()
    }

    /// Modes the active algorithm offers.
    pub fn available_modes(&self) -> Vec<ProcessingMode> {
        self.registry.available_modes()
    }

    /// Start a batch over the current selection.
    ///
    /// Rejects a mode the active algorithm does not offer. Empty selections
    /// and a missing algorithm are reported without changing any state.
    pub fn process(&mut self, mode: ProcessingMode) -> Result<()> {
        if self.registry.active().is_some() && !self.available_modes().contains(&mode) {
            return Err(ProcessingError::UnsupportedOutput { mode });
        }
        self.scheduler.start(mode, &self.registry, &self.bank)
    }

    pub fn request_cancellation(&mut self) {
        self.scheduler.request_cancellation();
    }

    /// Make the algorithm at `index` active. Counts as a parameter edit.
    pub fn select_algorithm(&mut self, index: usize) {
        self.select_algorithm_at(index, Instant::now());
    }

    /// [`select_algorithm`](Self::select_algorithm) with the edit stamped
    /// at `now`, on the same clock passed to [`tick()`](Self::tick).
    pub fn select_algorithm_at(&mut self, index: usize, now: Instant) {
        self.registry.select(index, &mut self.bank);
        self.parameter_changed(now);
    }

    /// Set parameter `index` to a plain value and record the edit.
    ///
    /// Returns the stored value after clamping, or `None` for an unknown
    /// index.
    pub fn set_parameter(&mut self, index: usize, value: f64) -> Option<f64> {
        self.set_parameter_at(index, value, Instant::now())
    }

    /// [`set_parameter`](Self::set_parameter) with the edit stamped at `now`.
    pub fn set_parameter_at(&mut self, index: usize, value: f64, now: Instant) -> Option<f64> {
        let stored = self.bank.set(index, value)?;
        if index == self.registry.choice_param() {
            self.registry.sync_from_bank(&self.bank);
        }
        self.parameter_changed(now);
        Some(stored)
    }

    pub fn set_auto_process(&mut self, enabled: bool) {
        self.trigger.set_enabled(enabled);
    }

    fn parameter_changed(&mut self, now: Instant) {
        self.trigger
            .notify_parameter_changed(now, self.scheduler.is_active());
        if self.settings_path.is_some() {
            if let Err(e) = self.save_settings() {
                log::warn!("failed to save settings: {}", e);
            }
        }
    }

    /// Drive auto-processing and the scheduler. Call once per host idle
    /// cycle.
    pub fn tick(&mut self, now: Instant) {
        if self.trigger.tick(now, self.scheduler.is_active()) {
            let mode = self.registry.auto_mode();
            log::debug!("auto-processing in {} mode", mode.as_str());
            // start() cancels any batch still in flight before replacing it
            if let Err(e) = self.scheduler.start(mode, &self.registry, &self.bank) {
                log::debug!("auto-process skipped: {}", e);
            }
        }
        self.scheduler.tick();
    }

    /// Restore parameters from the settings file.
    ///
    /// Returns `Ok(false)` when the file does not exist yet. Restored values
    /// do not count as user edits.
    pub fn load_settings(&mut self) -> std::result::Result<bool, SettingsError> {
        let path = self.settings_path.as_ref().ok_or(SettingsError::NoPath)?;
        if !path.exists() {
            log::debug!("no settings at {}", path.display());
            return Ok(false);
        }
        let settings = Settings::load(path)?;
        let restored = settings.apply(&mut self.bank, &self.registry);
        self.registry.sync_from_bank(&self.bank);
        self.trigger.reset();
        log::info!("restored {} parameters from {}", restored, path.display());
        Ok(true)
    }

    /// Write every parameter to the settings file.
    pub fn save_settings(&self) -> std::result::Result<(), SettingsError> {
        let path = self.settings_path.as_ref().ok_or(SettingsError::NoPath)?;
        Settings::capture(&self.bank, &self.registry).save(path)
    }
}
