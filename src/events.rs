use serde::{Deserialize, Serialize};

use crate::types::{BatchSummary, MediaItemRef, ProcessingMode};

/// Emitted when a batch begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStartedEvent {
    pub batch_id: String,
    pub mode: ProcessingMode,
    pub algorithm: String,
    pub total_items: usize,
    pub concurrency_limit: usize,
}

/// Emitted once per tick while a batch is active.
///
/// `progress` never decreases within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgressEvent {
    pub batch_id: String,
    pub progress: f64,
    pub completed: usize,
    pub total: usize,
}

/// Emitted when a single item fails. The batch keeps going.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailedEvent {
    pub batch_id: String,
    pub item: MediaItemRef,
    pub error: String,
}

/// Emitted when a batch closes, either drained or cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFinishedEvent {
    pub summary: BatchSummary,
}

/// Tagged union of every event, for observers that forward to a UI bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum BatchEvent {
    Started(BatchStartedEvent),
    Progress(BatchProgressEvent),
    ItemFailed(ItemFailedEvent),
    Finished(BatchFinishedEvent),
}

impl BatchEvent {
    /// Channel name, `analysis:<kind>`.
    pub fn name(&self) -> &'static str {
        match self {
            BatchEvent::Started(_) => "analysis:batch_started",
            BatchEvent::Progress(_) => "analysis:batch_progress",
            BatchEvent::ItemFailed(_) => "analysis:item_failed",
            BatchEvent::Finished(_) => "analysis:batch_finished",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
