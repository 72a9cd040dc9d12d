//! Progress reporting for detection passes.
//!
//! Progress is emitted from the thread running the pass, but callbacks may
//! be polled from elsewhere, so implementations must be `Send + Sync`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Detection phases, ordered by execution sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPhase {
    /// Quality filtering of the raw batch
    Filtering,
    /// DBSCAN over the kept samples
    Clustering,
    /// Per-cluster duplicate checks, scoring and decisions
    Planning,
    /// Writing places and visits to the store
    Committing,
}

impl DetectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionPhase::Filtering => "filtering",
            DetectionPhase::Clustering => "clustering",
            DetectionPhase::Planning => "planning",
            DetectionPhase::Committing => "committing",
        }
    }
}

/// Receives phase transitions and per-item progress during a detection pass.
pub trait DetectionProgressCallback: Send + Sync {
    /// Called when entering a new phase. `total` is the number of items in this phase.
    fn on_phase(&self, phase: DetectionPhase, total: u32);
    /// Called after completing one item in the current phase.
    fn on_progress(&self);
}

/// Callback that ignores all progress, used when none is supplied.
pub struct NoopProgress;

impl DetectionProgressCallback for NoopProgress {
    fn on_phase(&self, _phase: DetectionPhase, _total: u32) {}
    fn on_progress(&self) {}
}

/// Progress tracker that can be polled from another thread.
pub struct AtomicProgressTracker {
    pub phase: Mutex<Option<DetectionPhase>>,
    pub completed: AtomicU32,
    pub total: AtomicU32,
}

impl Default for AtomicProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicProgressTracker {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(None),
            completed: AtomicU32::new(0),
            total: AtomicU32::new(0),
        }
    }

    pub fn current_phase(&self) -> Option<DetectionPhase> {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DetectionProgressCallback for AtomicProgressTracker {
    fn on_phase(&self, phase: DetectionPhase, total: u32) {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(phase);
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn on_progress(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}
