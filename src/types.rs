use serde::{Deserialize, Serialize};

/// Opaque handle to a host-owned media item.
///
/// The scheduler only stores and compares handles. Reading or mutating the
/// item always goes through [`MediaHost`](crate::host::MediaHost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaItemRef(pub u64);

impl std::fmt::Display for MediaItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Timeline and format information for a media item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemInfo {
    /// Project time of the item start, in seconds.
    pub position: f64,
    /// Item length in seconds.
    pub length: f64,
    pub sample_rate: u32,
    pub channels: usize,
}

/// What a finished batch does with each item's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingMode {
    /// Write point markers on the item's active take.
    Segment,
    /// Create project regions between consecutive slice points.
    Regions,
    /// Add rendered audio as new takes.
    ProcessAudio,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessingMode::Segment => "segment",
            ProcessingMode::Regions => "regions",
            ProcessingMode::ProcessAudio => "processAudio",
        }
    }
}

/// Job lifecycle: Created -> Running -> Finished, with Cancelled reachable
/// from any state before finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Created,
    Running,
    Finished,
    Cancelled,
}

/// Non-interleaved audio, one `Vec<f32>` per channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    /// Allocate a silent buffer.
    pub fn silent(sample_rate: u32, num_channels: usize, frames: usize) -> Self {
        Self::new(sample_rate, vec![vec![0.0; frames]; num_channels])
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (length of the shortest channel).
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Average all channels down to one.
    pub fn mono_mix(&self) -> Vec<f32> {
        let frames = self.frames();
        let n = self.channels.len();
        if n == 0 {
            return Vec::new();
        }
        (0..frames)
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / n as f32)
            .collect()
    }
}

/// The artifact produced by an [`Algorithm`](crate::Algorithm).
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmOutput {
    /// Slice positions in samples. Entries `<= 0` are padding and ignored.
    Slices(Vec<f64>),
    /// Rendered audio, one buffer per new take.
    Audio(Vec<AudioBuffer>),
}

/// Point-in-time view of the scheduler queues.
///
/// Between ticks `pending + active + finalizing + completed == total` holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
    pub active_batch: bool,
    pub pending: usize,
    pub active: usize,
    pub finalizing: usize,
    pub completed: usize,
    pub total: usize,
    pub progress: f64,
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchOutcome {
    Completed,
    CompletedWithErrors,
    Cancelled,
}

/// Summary of a closed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: String,
    pub mode: ProcessingMode,
    pub algorithm: String,
    pub outcome: BatchOutcome,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items that were pending, running or awaiting finalization when the
    /// batch was cancelled.
    pub cancelled: usize,
    pub started_at: String,
    pub completed_at: String,
    pub duration_ms: u64,
}
