#![allow(dead_code)]

use analysis_batch::*;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A tiny in-memory timeline that prints every edit.
#[derive(Default)]
pub struct PrintingHost {
    items: Mutex<BTreeMap<u64, (f64, AudioBuffer)>>,
    next_undo: Mutex<u64>,
}

impl PrintingHost {
    pub fn add_item(&self, id: u64, position: f64, source: AudioBuffer) {
        self.items.lock().unwrap().insert(id, (position, source));
    }

    fn get<T>(&self, item: MediaItemRef, f: impl FnOnce(f64, &AudioBuffer) -> T) -> Result<T, HostError> {
        let items = self.items.lock().unwrap();
        items
            .get(&item.0)
            .map(|(pos, src)| f(*pos, src))
            .ok_or(HostError::ItemNotFound(item))
    }
}

impl MediaHost for PrintingHost {
    fn selected_items(&self) -> Vec<MediaItemRef> {
        self.items.lock().unwrap().keys().map(|&id| MediaItemRef(id)).collect()
    }

    fn item_info(&self, item: MediaItemRef) -> Result<ItemInfo, HostError> {
        self.get(item, |position, src| ItemInfo {
            position,
            length: src.duration_secs(),
            sample_rate: src.sample_rate,
            channels: src.num_channels(),
        })
    }

    fn read_source(&self, item: MediaItemRef) -> Result<AudioBuffer, HostError> {
        self.get(item, |_, src| src.clone())
    }

    fn clear_take_markers(&self, item: MediaItemRef) -> Result<(), HostError> {
        println!("  [{}] clear markers", item);
        Ok(())
    }

    fn add_take_marker(&self, item: MediaItemRef, time: f64) -> Result<(), HostError> {
        println!("  [{}] marker at {:.3}s", item, time);
        Ok(())
    }

    fn add_region(&self, item: MediaItemRef, start: f64, end: f64, name: &str) -> Result<(), HostError> {
        println!("  [{}] {} {:.3}s..{:.3}s", item, name, start, end);
        Ok(())
    }

    fn add_take(&self, item: MediaItemRef, audio: &AudioBuffer, name: &str) -> Result<(), HostError> {
        println!("  [{}] new take '{}' ({} frames)", item, name, audio.frames());
        Ok(())
    }

    fn set_item_locked(&self, _item: MediaItemRef, _locked: bool) {}

    fn begin_undo(&self, _anchor: MediaItemRef) -> UndoHandle {
        let mut next = self.next_undo.lock().unwrap();
        *next += 1;
        UndoHandle(*next)
    }

    fn end_undo(&self, handle: UndoHandle, label: &str) {
        println!("undo block {} closed: {}", handle.0, label);
    }
}

/// Prints progress and the final summary.
pub struct ProgressPrinter;

impl BatchObserver for ProgressPrinter {
    fn on_event(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Started(e) => println!(
                "started {} over {} items ({} at a time)",
                e.algorithm, e.total_items, e.concurrency_limit
            ),
            BatchEvent::Progress(e) => println!("progress {:>5.1}%", e.progress * 100.0),
            BatchEvent::ItemFailed(e) => println!("{} failed: {}", e.item, e.error),
            BatchEvent::Finished(e) => println!(
                "finished: {:?}, {} ok / {} failed in {}ms",
                e.summary.outcome, e.summary.succeeded, e.summary.failed, e.summary.duration_ms
            ),
        }
    }
}

/// Silence with short 0.5-amplitude bursts starting at `onsets` (seconds).
pub fn bursts(sample_rate: u32, length: f64, onsets: &[f64]) -> AudioBuffer {
    let frames = (length * sample_rate as f64) as usize;
    let burst = sample_rate as usize / 20;
    let mut samples = vec![0.0f32; frames];
    for &t in onsets {
        let start = (t * sample_rate as f64) as usize;
        for v in samples.iter_mut().skip(start).take(burst) {
            *v = 0.5;
        }
    }
    AudioBuffer::mono(sample_rate, samples)
}
