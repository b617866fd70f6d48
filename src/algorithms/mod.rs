//! Algorithm registration and the active selection.

mod amp_gate;
mod amp_slice;
mod envelope;

pub use amp_gate::AmpGateAlgorithm;
pub use amp_slice::AmpSliceAlgorithm;

use std::sync::Arc;

use crate::params::{ParamRange, ParamSpec, ParameterBank};
use crate::types::ProcessingMode;
use crate::Algorithm;

/// Name of the global algorithm choice parameter.
pub const ALGORITHM_CHOICE_PARAM: &str = "Algorithm";

/// Samples processed between progress reports and cancellation checks.
pub(crate) const CHUNK_SIZE: usize = 4096;

struct Entry {
    algorithm: Arc<dyn Algorithm>,
    range: ParamRange,
}

/// The set of available algorithms, their parameter ranges, and which one is
/// active.
///
/// The algorithm choice is itself a parameter (always registered first), so
/// it is persisted alongside every algorithm's own parameters.
pub struct AlgorithmRegistry {
    entries: Vec<Entry>,
    choice_param: usize,
    active: Option<usize>,
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("algorithms", &self.names())
            .field("active", &self.active)
            .finish()
    }
}

impl AlgorithmRegistry {
    /// Register the choice parameter and then each algorithm's parameters, in
    /// order. The first algorithm starts out active.
    pub fn new(algorithms: Vec<Arc<dyn Algorithm>>, bank: &mut ParameterBank) -> Self {
        let names: Vec<String> = algorithms.iter().map(|a| a.name().to_string()).collect();
        let choice = bank.register(vec![ParamSpec::choice(ALGORITHM_CHOICE_PARAM, 0, names)]);

        let entries = algorithms
            .into_iter()
            .map(|algorithm| {
                let range = bank.register(algorithm.parameters());
                Entry { algorithm, range }
            })
            .collect::<Vec<_>>();

        let active = (!entries.is_empty()).then_some(0);
        Self {
            entries,
            choice_param: choice.start,
            active,
        }
    }

    /// Registry with the built-in amplitude slicer and gate.
    pub fn with_builtins(bank: &mut ParameterBank) -> Self {
        Self::new(
            vec![
                Arc::new(AmpSliceAlgorithm::new()),
                Arc::new(AmpGateAlgorithm::new()),
            ],
            bank,
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.algorithm.name()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Algorithm>> {
        self.entries.get(index).map(|e| &e.algorithm)
    }

    /// Parameter range reserved for the algorithm at `index`.
    pub fn range(&self, index: usize) -> Option<ParamRange> {
        self.entries.get(index).map(|e| e.range)
    }

    /// Every algorithm with its parameter range, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<dyn Algorithm>, ParamRange)> {
        self.entries.iter().map(|e| (&e.algorithm, e.range))
    }

    /// Global index of the algorithm choice parameter.
    pub fn choice_param(&self) -> usize {
        self.choice_param
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&Arc<dyn Algorithm>> {
        self.active.and_then(|i| self.get(i))
    }

    /// Snapshot of the active algorithm's parameter values.
    pub fn active_params(&self, bank: &ParameterBank) -> Vec<f64> {
        self.active
            .and_then(|i| self.range(i))
            .map(|r| bank.snapshot(r))
            .unwrap_or_default()
    }

    /// Make the algorithm at `index` active. Out-of-range indices clear the
    /// selection, leaving no active algorithm.
    pub fn select(&mut self, index: usize, bank: &mut ParameterBank) {
        if index < self.entries.len() {
            self.active = Some(index);
            bank.set(self.choice_param, index as f64);
        } else {
            log::warn!("select: no algorithm at index {}", index);
            self.active = None;
        }
    }

    /// Re-read the active selection from the choice parameter, e.g. after
    /// loading settings.
    pub fn sync_from_bank(&mut self, bank: &ParameterBank) {
        if let Some(v) = bank.get(self.choice_param) {
            let index = v as usize;
            self.active = (index < self.entries.len()).then_some(index);
        }
    }

    /// Modes the active algorithm offers, in display order.
    pub fn available_modes(&self) -> Vec<ProcessingMode> {
        let Some(algorithm) = self.active() else {
            return Vec::new();
        };
        let mut modes = Vec::new();
        if algorithm.supports_segmentation() {
            modes.push(ProcessingMode::Segment);
        }
        if algorithm.supports_regions() {
            modes.push(ProcessingMode::Regions);
        }
        if algorithm.creates_takes() {
            modes.push(ProcessingMode::ProcessAudio);
        }
        modes
    }

    /// Mode used by automatic processing: render takes when the active
    /// algorithm creates them, otherwise place markers.
    pub fn auto_mode(&self) -> ProcessingMode {
        match self.active() {
            Some(a) if a.creates_takes() => ProcessingMode::ProcessAudio,
            _ => ProcessingMode::Segment,
        }
    }
}

/// Convert a dB value to linear amplitude.
pub(crate) fn db_to_amp(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Convert linear amplitude to dB, clamped below at `floor_db`.
pub(crate) fn amp_to_db(amp: f64, floor_db: f64) -> f64 {
    if amp <= 0.0 {
        return floor_db;
    }
    (20.0 * amp.log10()).max(floor_db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_register_choice_first() {
        let mut bank = ParameterBank::new();
        let registry = AlgorithmRegistry::with_builtins(&mut bank);

        assert_eq!(registry.choice_param(), 0);
        assert_eq!(registry.names(), vec!["Amp Slice", "Amp Gate"]);
        let slice_range = registry.range(0).unwrap();
        let gate_range = registry.range(1).unwrap();
        assert_eq!(slice_range.start, 1);
        assert_eq!(gate_range.start, slice_range.start + slice_range.len);
        assert_eq!(bank.len(), 1 + slice_range.len + gate_range.len);
    }

    #[test]
    fn test_select_and_modes() {
        let mut bank = ParameterBank::new();
        let mut registry = AlgorithmRegistry::with_builtins(&mut bank);

        assert_eq!(
            registry.available_modes(),
            vec![ProcessingMode::Segment, ProcessingMode::Regions]
        );
        assert_eq!(registry.auto_mode(), ProcessingMode::Segment);

        registry.select(1, &mut bank);
        assert_eq!(bank.get(registry.choice_param()), Some(1.0));
        assert_eq!(registry.available_modes(), vec![ProcessingMode::ProcessAudio]);
        assert_eq!(registry.auto_mode(), ProcessingMode::ProcessAudio);

        registry.select(9, &mut bank);
        assert!(registry.active().is_none());
        assert!(registry.available_modes().is_empty());
    }

    #[test]
    fn test_sync_from_bank() {
        let mut bank = ParameterBank::new();
        let mut registry = AlgorithmRegistry::with_builtins(&mut bank);

        bank.set_normalized(registry.choice_param(), 1.0);
        registry.sync_from_bank(&bank);
        assert_eq!(registry.active_index(), Some(1));
    }

    #[test]
    fn test_db_conversions() {
        assert!((db_to_amp(-20.0) - 0.1).abs() < 1e-12);
        assert_eq!(amp_to_db(0.0, -70.0), -70.0);
        assert!((amp_to_db(1.0, -70.0)).abs() < 1e-12);
        assert_eq!(amp_to_db(1e-9, -70.0), -70.0);
    }
}
