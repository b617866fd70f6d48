//! Narrow interfaces to the host application.
//!
//! The scheduler never touches host state directly: everything it needs from
//! the timeline editor goes through [`MediaHost`], and everything the UI needs
//! to know goes through [`BatchObserver`].

use std::sync::Arc;

use crate::error::HostError;
use crate::events::BatchEvent;
use crate::types::{AudioBuffer, ItemInfo, MediaItemRef};

/// Opaque token for an open undo-grouping scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UndoHandle(pub u64);

/// Host item/track API consumed by the scheduler and its jobs.
///
/// All methods are called from the tick thread only.
pub trait MediaHost {
    /// Currently selected items, in selection enumeration order.
    fn selected_items(&self) -> Vec<MediaItemRef>;

    /// Position, length and format of an item.
    fn item_info(&self, item: MediaItemRef) -> Result<ItemInfo, HostError>;

    /// Read the active take's source audio.
    fn read_source(&self, item: MediaItemRef) -> Result<AudioBuffer, HostError>;

    /// Remove every marker on the item's active take.
    fn clear_take_markers(&self, item: MediaItemRef) -> Result<(), HostError>;

    /// Add a marker at `time` seconds relative to the take start.
    fn add_take_marker(&self, item: MediaItemRef, time: f64) -> Result<(), HostError>;

    /// Create a project region in the item's project, in project time.
    fn add_region(
        &self,
        item: MediaItemRef,
        start: f64,
        end: f64,
        name: &str,
    ) -> Result<(), HostError>;

    /// Add a new take to the item rendered from `audio`.
    fn add_take(&self, item: MediaItemRef, audio: &AudioBuffer, name: &str)
        -> Result<(), HostError>;

    /// Set or clear the advisory edit lock on an item.
    fn set_item_locked(&self, item: MediaItemRef, locked: bool);

    /// Open an undo scope in the project that owns `anchor`.
    fn begin_undo(&self, anchor: MediaItemRef) -> UndoHandle;

    /// Close an undo scope.
    fn end_undo(&self, handle: UndoHandle, label: &str);

    /// Redraw arrange/timeline views after a batch closes.
    fn refresh_views(&self) {}
}

/// Receives progress and UI enable/disable signals.
///
/// Every method has a no-op default so observers only implement what they draw.
pub trait BatchObserver {
    fn on_event(&self, _event: &BatchEvent) {}

    /// Enable or disable the cancel affordance.
    fn set_cancel_enabled(&self, _enabled: bool) {}

    /// Enable or disable the rest of the UI while a batch is active.
    fn set_controls_enabled(&self, _enabled: bool) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Collaborators shared by the scheduler and every job it creates.
#[derive(Clone)]
pub struct HostContext {
    pub host: Arc<dyn MediaHost>,
    pub observer: Arc<dyn BatchObserver>,
}

impl HostContext {
    pub fn new(host: Arc<dyn MediaHost>, observer: Arc<dyn BatchObserver>) -> Self {
        Self { host, observer }
    }

    /// Context with a [`NoopObserver`].
    pub fn without_observer(host: Arc<dyn MediaHost>) -> Self {
        Self::new(host, Arc::new(NoopObserver))
    }

    pub(crate) fn emit(&self, event: BatchEvent) {
        log::trace!("emit {}", event.name());
        self.observer.on_event(&event);
    }
}

/// Holds an item's edit lock and releases it on drop, including on early
/// returns from a failed finalize.
pub(crate) struct ItemLock<'a> {
    host: &'a dyn MediaHost,
    item: MediaItemRef,
}

impl<'a> ItemLock<'a> {
    pub(crate) fn acquire(host: &'a dyn MediaHost, item: MediaItemRef) -> Self {
        host.set_item_locked(item, true);
        Self { host, item }
    }
}

impl Drop for ItemLock<'_> {
    fn drop(&mut self) {
        self.host.set_item_locked(self.item, false);
    }
}
