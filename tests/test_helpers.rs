#![allow(dead_code)]

use analysis_batch::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Every host mutation the scheduler performs, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    ClearMarkers(MediaItemRef),
    Marker(MediaItemRef, f64),
    Region {
        item: MediaItemRef,
        start: f64,
        end: f64,
        name: String,
    },
    Take {
        item: MediaItemRef,
        name: String,
        frames: usize,
    },
    Lock(MediaItemRef, bool),
    BeginUndo(MediaItemRef),
    EndUndo(String),
    Refresh,
}

struct MockItem {
    position: f64,
    source: AudioBuffer,
}

#[derive(Default)]
struct MockState {
    items: HashMap<u64, MockItem>,
    selection: Vec<MediaItemRef>,
    calls: Vec<HostCall>,
    next_undo: u64,
}

/// In-memory host with a flat list of items.
#[derive(Default)]
pub struct MockHost {
    state: Mutex<MockState>,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a silent mono item of `length` seconds and select it.
    pub fn add_item(&self, id: u64, position: f64, length: f64, sample_rate: u32) -> MediaItemRef {
        let frames = (length * sample_rate as f64).round() as usize;
        self.add_item_with_source(id, position, AudioBuffer::silent(sample_rate, 1, frames))
    }

    pub fn add_item_with_source(&self, id: u64, position: f64, source: AudioBuffer) -> MediaItemRef {
        let item = MediaItemRef(id);
        let mut state = self.state.lock().unwrap();
        state.items.insert(id, MockItem { position, source });
        state.selection.push(item);
        item
    }

    /// Delete an item, as if the user removed it mid-batch.
    pub fn remove_item(&self, id: u64) {
        self.state.lock().unwrap().items.remove(&id);
    }

    pub fn clear_selection(&self) {
        self.state.lock().unwrap().selection.clear();
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn markers(&self, item: MediaItemRef) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Marker(i, t) if i == item => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn regions(&self) -> Vec<(f64, f64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Region {
                    start, end, name, ..
                } => Some((start, end, name)),
                _ => None,
            })
            .collect()
    }

    pub fn takes(&self) -> Vec<(MediaItemRef, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Take { item, name, .. } => Some((item, name)),
                _ => None,
            })
            .collect()
    }

    /// Items whose lock was released, in call order.
    pub fn unlocks(&self) -> Vec<MediaItemRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Lock(i, false) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn undo_begins(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HostCall::BeginUndo(_)))
            .count()
    }

    pub fn undo_labels(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::EndUndo(label) => Some(label),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HostCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn with_item<T>(
        &self,
        item: MediaItemRef,
        f: impl FnOnce(&MockItem) -> T,
    ) -> Result<T, HostError> {
        let state = self.state.lock().unwrap();
        state
            .items
            .get(&item.0)
            .map(f)
            .ok_or(HostError::ItemNotFound(item))
    }
}

impl MediaHost for MockHost {
    fn selected_items(&self) -> Vec<MediaItemRef> {
        self.state.lock().unwrap().selection.clone()
    }

    fn item_info(&self, item: MediaItemRef) -> Result<ItemInfo, HostError> {
        self.with_item(item, |i| ItemInfo {
            position: i.position,
            length: i.source.duration_secs(),
            sample_rate: i.source.sample_rate,
            channels: i.source.num_channels(),
        })
    }

    fn read_source(&self, item: MediaItemRef) -> Result<AudioBuffer, HostError> {
        self.with_item(item, |i| i.source.clone())
    }

    fn clear_take_markers(&self, item: MediaItemRef) -> Result<(), HostError> {
        self.record(HostCall::ClearMarkers(item));
        Ok(())
    }

    fn add_take_marker(&self, item: MediaItemRef, time: f64) -> Result<(), HostError> {
        self.record(HostCall::Marker(item, time));
        Ok(())
    }

    fn add_region(
        &self,
        item: MediaItemRef,
        start: f64,
        end: f64,
        name: &str,
    ) -> Result<(), HostError> {
        self.record(HostCall::Region {
            item,
            start,
            end,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_take(&self, item: MediaItemRef, audio: &AudioBuffer, name: &str) -> Result<(), HostError> {
        self.record(HostCall::Take {
            item,
            name: name.to_string(),
            frames: audio.frames(),
        });
        Ok(())
    }

    fn set_item_locked(&self, item: MediaItemRef, locked: bool) {
        self.record(HostCall::Lock(item, locked));
    }

    fn begin_undo(&self, anchor: MediaItemRef) -> UndoHandle {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HostCall::BeginUndo(anchor));
        state.next_undo += 1;
        UndoHandle(state.next_undo)
    }

    fn end_undo(&self, _handle: UndoHandle, label: &str) {
        self.record(HostCall::EndUndo(label.to_string()));
    }

    fn refresh_views(&self) {
        self.record(HostCall::Refresh);
    }
}

/// Observer that keeps every event and UI signal.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<BatchEvent>>,
    pub cancel_enabled: Mutex<Vec<bool>>,
    pub controls_enabled: Mutex<Vec<bool>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress(p) => Some(p.progress),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<ItemFailedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::ItemFailed(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn summaries(&self) -> Vec<BatchSummary> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Finished(f) => Some(f.summary.clone()),
                _ => None,
            })
            .collect()
    }
}

impl BatchObserver for RecordingObserver {
    fn on_event(&self, event: &BatchEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn set_cancel_enabled(&self, enabled: bool) {
        self.cancel_enabled.lock().unwrap().push(enabled);
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.controls_enabled.lock().unwrap().push(enabled);
    }
}

/// Returns the same slice positions for every item.
pub struct FixedSlices {
    pub slices: Vec<f64>,
}

impl Algorithm for FixedSlices {
    fn name(&self) -> &str {
        "Fixed Slices"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::double("Scale", 1.0, 0.0, 4.0)]
    }

    fn supports_segmentation(&self) -> bool {
        true
    }

    fn supports_regions(&self) -> bool {
        true
    }

    fn process(
        &self,
        _source: &AudioBuffer,
        params: &[f64],
        _ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput> {
        let scale = params.first().copied().unwrap_or(1.0);
        Ok(AlgorithmOutput::Slices(
            self.slices.iter().map(|s| s * scale).collect(),
        ))
    }
}

/// Slices like [`FixedSlices`] but fails on sources at `fail_rate`.
pub struct FailOnRate {
    pub fail_rate: u32,
}

impl Algorithm for FailOnRate {
    fn name(&self) -> &str {
        "Fail On Rate"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn supports_segmentation(&self) -> bool {
        true
    }

    fn process(
        &self,
        source: &AudioBuffer,
        _params: &[f64],
        _ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput> {
        if source.sample_rate == self.fail_rate {
            anyhow::bail!("cannot analyse {} Hz audio", self.fail_rate);
        }
        Ok(AlgorithmOutput::Slices(vec![(source.frames() / 2) as f64]))
    }
}

pub struct Panicking;

impl Algorithm for Panicking {
    fn name(&self) -> &str {
        "Panicking"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn supports_segmentation(&self) -> bool {
        true
    }

    fn process(
        &self,
        _source: &AudioBuffer,
        _params: &[f64],
        _ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput> {
        panic!("algorithm bug");
    }
}

/// Renders `copies` takes, each a copy of the source.
pub struct Render {
    pub copies: usize,
}

impl Algorithm for Render {
    fn name(&self) -> &str {
        "Render"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn creates_takes(&self) -> bool {
        true
    }

    fn process(
        &self,
        source: &AudioBuffer,
        _params: &[f64],
        _ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput> {
        Ok(AlgorithmOutput::Audio(vec![source.clone(); self.copies]))
    }
}

/// Runs until released or cancelled, reporting half progress meanwhile.
/// Only useful with a runtime executor.
pub struct Blocking {
    pub released: Arc<AtomicBool>,
}

impl Blocking {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        (
            Self {
                released: Arc::clone(&released),
            },
            released,
        )
    }
}

impl Algorithm for Blocking {
    fn name(&self) -> &str {
        "Blocking"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn supports_segmentation(&self) -> bool {
        true
    }

    fn process(
        &self,
        source: &AudioBuffer,
        _params: &[f64],
        ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput> {
        ctx.report_progress(0.5);
        while !self.released.load(Ordering::SeqCst) {
            if ctx.is_cancelled() {
                anyhow::bail!("stopped");
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(AlgorithmOutput::Slices(vec![(source.frames() / 2) as f64]))
    }
}

/// Takes a fixed wall-clock time per item. Stops early once cancelled.
pub struct Slow {
    pub per_item: Duration,
}

impl Algorithm for Slow {
    fn name(&self) -> &str {
        "Slow"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn supports_segmentation(&self) -> bool {
        true
    }

    fn process(
        &self,
        source: &AudioBuffer,
        _params: &[f64],
        ctx: &AlgorithmContext,
    ) -> anyhow::Result<AlgorithmOutput> {
        let deadline = std::time::Instant::now() + self.per_item;
        while std::time::Instant::now() < deadline {
            if ctx.is_cancelled() {
                anyhow::bail!("stopped");
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(AlgorithmOutput::Slices(vec![(source.frames() / 2) as f64]))
    }
}

pub fn session_with(
    host: &Arc<MockHost>,
    observer: &Arc<RecordingObserver>,
    config: SchedulerConfig,
    algorithms: Vec<Arc<dyn Algorithm>>,
) -> AnalysisSession {
    AnalysisSession::with_algorithms(
        HostContext::new(host.clone(), observer.clone()),
        config,
        algorithms,
    )
}

pub fn scheduler_with(
    host: &Arc<MockHost>,
    observer: &Arc<RecordingObserver>,
    limit: usize,
) -> BatchScheduler {
    BatchScheduler::new(
        HostContext::new(host.clone(), observer.clone()),
        SchedulerConfig::builder()
            .with_concurrency_limit(limit)
            .with_executor(JobExecutor::Inline)
            .build(),
    )
}

/// Registry holding a single algorithm, and its parameter bank.
pub fn registry_of(algorithm: Arc<dyn Algorithm>) -> (AlgorithmRegistry, ParameterBank) {
    let mut bank = ParameterBank::new();
    let registry = AlgorithmRegistry::new(vec![algorithm], &mut bank);
    (registry, bank)
}

pub fn assert_counts(snapshot: &BatchSnapshot) {
    assert_eq!(
        snapshot.pending + snapshot.active + snapshot.finalizing + snapshot.completed,
        snapshot.total,
        "queue counts out of balance: {:?}",
        snapshot
    );
}

/// Tick until the batch closes, checking the count invariant every tick.
/// Returns the number of ticks taken.
pub fn run_to_completion(scheduler: &mut BatchScheduler) -> usize {
    let mut ticks = 0;
    while scheduler.is_active() {
        scheduler.tick();
        assert_counts(&scheduler.snapshot());
        ticks += 1;
        assert!(ticks < 10_000, "batch never drained");
        if ticks % 10 == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    ticks
}
