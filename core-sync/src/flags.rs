//! Shared sync flags
//!
//! The status handler is the only writer of `syncing` and the last known
//! progress. The closing gate and the progress sink read them concurrently and
//! record user responses (cancel/stop) from the indicator.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Flags shared between the status handler, the progress sink and the closing gate.
#[derive(Debug, Default)]
pub struct SyncFlags {
    syncing: AtomicBool,
    closing_cancelled: AtomicBool,
    stop_requested: AtomicBool,
    detached: AtomicBool,
    progress_bits: AtomicU64,
}

impl SyncFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Stores the new value and returns the previous one.
    pub fn set_syncing(&self, syncing: bool) -> bool {
        self.syncing.swap(syncing, Ordering::AcqRel)
    }

    pub fn closing_cancelled(&self) -> bool {
        self.closing_cancelled.load(Ordering::Acquire)
    }

    /// Sticky for the lifetime of the orchestrator.
    pub fn record_closing_cancelled(&self) {
        self.closing_cancelled.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn record_stop_requested(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn clear_stop_request(&self) {
        self.stop_requested.store(false, Ordering::Release);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn mark_detached(&self) -> bool {
        !self.detached.swap(true, Ordering::AcqRel)
    }

    pub fn last_progress(&self) -> f64 {
        f64::from_bits(self.progress_bits.load(Ordering::Acquire))
    }

    pub fn set_last_progress(&self, progress: f64) {
        self.progress_bits
            .store(progress.to_bits(), Ordering::Release);
    }
}
