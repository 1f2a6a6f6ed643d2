//! Single-slot latest-frame hand-off between the capture thread and the display

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam::utils::CachePadded;

use crate::detection::DetectionResult;

/// What the consumer sees when it polls
#[derive(Debug, Clone)]
pub enum Latest {
    Frame(Arc<DetectionResult>),
    /// Nothing published yet, or the session stopped
    Placeholder,
}

impl Latest {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Latest::Placeholder)
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            Latest::Frame(r) => Some(r),
            Latest::Placeholder => None,
        }
    }
}

/// Holds only the most recent result. Publishing swaps a pointer and never
/// blocks; readers get a whole result or nothing.
pub struct FrameChannel {
    slot: ArcSwapOption<DetectionResult>,
    /// Set by publish, cleared by take_latest
    fresh: AtomicBool,
    stats: CachePadded<Stats>,
}

#[derive(Default)]
struct Stats {
    published: AtomicU64,
    observed: AtomicU64,
    overwritten: AtomicU64,
}

/// Snapshot of channel counters. Advisory only under contention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub published: u64,
    pub observed: u64,
    /// Results replaced before any consumer saw them
    pub overwritten: u64,
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameChannel {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            fresh: AtomicBool::new(false),
            stats: CachePadded::new(Stats::default()),
        }
    }

    /// Producer: replace whatever is in the slot
    pub fn publish(&self, result: DetectionResult) {
        self.slot.store(Some(Arc::new(result)));
        self.stats.published.fetch_add(1, Ordering::Relaxed);

        if self.fresh.swap(true, Ordering::AcqRel) {
            self.stats.overwritten.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("vigil_frames_dropped").increment(1);
        }
    }

    /// Consumer: latest result, or the placeholder. Does not empty the slot.
    pub fn take_latest(&self) -> Latest {
        match self.slot.load_full() {
            Some(result) => {
                if self.fresh.swap(false, Ordering::AcqRel) {
                    self.stats.observed.fetch_add(1, Ordering::Relaxed);
                }
                Latest::Frame(result)
            }
            None => Latest::Placeholder,
        }
    }

    /// Drop the held result so consumers fall back to the placeholder
    pub fn clear(&self) {
        self.slot.store(None);
        self.fresh.store(false, Ordering::Release);
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            published: self.stats.published.load(Ordering::Relaxed),
            observed: self.stats.observed.load(Ordering::Relaxed),
            overwritten: self.stats.overwritten.load(Ordering::Relaxed),
        }
    }
}
