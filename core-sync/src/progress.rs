//! # Progress Sink
//!
//! Mirrors upload progress onto a host progress indicator.
//!
//! The sink owns at most one live [`ProgressHandle`]. Fractions are scaled onto
//! a fixed tick range (10 000 by default) before being forwarded, and the
//! user's response to the indicator is translated into a [`ProgressSignal`]:
//!
//! | Indicator result | Recorded           | Handle   | Signal     |
//! |------------------|--------------------|----------|------------|
//! | `Continue`       | -                  | kept     | `Continue` |
//! | `Cancelled`      | closing cancelled  | released | `Continue` |
//! | `Stopped`        | stop requested     | released | `Halt`     |

use crate::error::{Result, SyncError};
use crate::flags::SyncFlags;
use bridge_traits::progress::{ProgressHandle, ProgressOptions, ProgressReporter, ProgressResult};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// What the caller of [`ProgressSink::report`] should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    /// Keep going
    Continue,
    /// The user asked to stop; propagate upward
    Halt,
}

/// Single-slot owner of the host progress indicator.
pub struct ProgressSink {
    reporter: Arc<dyn ProgressReporter>,
    flags: Arc<SyncFlags>,
    title: String,
    message: String,
    resolution: u64,
    handle: Mutex<Option<Box<dyn ProgressHandle>>>,
}

impl ProgressSink {
    pub fn new(
        reporter: Arc<dyn ProgressReporter>,
        flags: Arc<SyncFlags>,
        title: impl Into<String>,
        message: impl Into<String>,
        resolution: u64,
    ) -> Self {
        Self {
            reporter,
            flags,
            title: title.into(),
            message: message.into(),
            resolution: resolution.max(1),
            handle: Mutex::new(None),
        }
    }

    /// Forward `progress` to the indicator, creating it on first use.
    ///
    /// No indicator is created once the user has cancelled the wait or asked
    /// to stop; an already visible one keeps being updated.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidProgress`] if `progress` is not a finite
    /// value in `[0, 1]`.
    pub fn report(&self, progress: f64) -> Result<ProgressSignal> {
        let tick = self.tick(progress)?;
        let mut slot = self.slot();

        if slot.is_none() {
            if self.flags.closing_cancelled() || self.flags.stop_requested() {
                return Ok(ProgressSignal::Continue);
            }
            *slot = Some(self.show());
        }

        let result = match slot.as_mut() {
            Some(handle) => handle.poll(tick, self.resolution),
            None => ProgressResult::Continue,
        };

        Ok(match result {
            ProgressResult::Continue => ProgressSignal::Continue,
            ProgressResult::Cancelled => {
                debug!("Wait for sync cancelled by user");
                self.flags.record_closing_cancelled();
                *slot = None;
                ProgressSignal::Continue
            }
            ProgressResult::Stopped => {
                debug!("Stop requested from progress indicator");
                self.flags.record_stop_requested();
                *slot = None;
                ProgressSignal::Halt
            }
        })
    }

    /// Make sure an indicator is visible.
    pub fn ensure_visible(&self) {
        let mut slot = self.slot();
        if slot.is_none() {
            *slot = Some(self.show());
        }
    }

    /// Drop the indicator if there is one.
    pub fn reset(&self) {
        self.slot().take();
    }

    pub fn is_visible(&self) -> bool {
        self.slot().is_some()
    }

    pub fn resolution(&self) -> u64 {
        self.resolution
    }

    /// Scale a fraction onto the tick range.
    pub fn tick(&self, progress: f64) -> Result<u64> {
        if !progress.is_finite() || !(0.0..=1.0).contains(&progress) {
            return Err(SyncError::InvalidProgress(progress));
        }
        let tick = (progress * self.resolution as f64).round() as u64;
        Ok(tick.min(self.resolution))
    }

    fn show(&self) -> Box<dyn ProgressHandle> {
        debug!(title = %self.title, "Showing sync progress indicator");
        self.reporter.show_progress(
            &self.title,
            &self.message,
            ProgressOptions::cancel_and_stop(),
        )
    }

    fn slot(&self) -> MutexGuard<'_, Option<Box<dyn ProgressHandle>>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("title", &self.title)
            .field("resolution", &self.resolution)
            .field("visible", &self.is_visible())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Recorded {
        shown: usize,
        dropped: usize,
        polls: Vec<(u64, u64)>,
        responses: VecDeque<ProgressResult>,
    }

    #[derive(Default, Clone)]
    struct FakeReporter {
        state: Arc<Mutex<Recorded>>,
    }

    impl FakeReporter {
        fn respond_with(&self, result: ProgressResult) {
            self.state.lock().unwrap().responses.push_back(result);
        }

        fn shown(&self) -> usize {
            self.state.lock().unwrap().shown
        }

        fn dropped(&self) -> usize {
            self.state.lock().unwrap().dropped
        }

        fn ticks(&self) -> Vec<u64> {
            self.state.lock().unwrap().polls.iter().map(|(v, _)| *v).collect()
        }
    }

    struct FakeHandle {
        state: Arc<Mutex<Recorded>>,
    }

    impl ProgressHandle for FakeHandle {
        fn poll(&mut self, value: u64, max: u64) -> ProgressResult {
            let mut state = self.state.lock().unwrap();
            state.polls.push((value, max));
            state.responses.pop_front().unwrap_or(ProgressResult::Continue)
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.state.lock().unwrap().dropped += 1;
        }
    }

    impl ProgressReporter for FakeReporter {
        fn show_progress(
            &self,
            _title: &str,
            _message: &str,
            options: ProgressOptions,
        ) -> Box<dyn ProgressHandle> {
            assert!(options.show_cancel && options.show_stop);
            self.state.lock().unwrap().shown += 1;
            Box::new(FakeHandle {
                state: self.state.clone(),
            })
        }
    }

    fn sink(reporter: &FakeReporter) -> (ProgressSink, Arc<SyncFlags>) {
        let flags = Arc::new(SyncFlags::new());
        let sink = ProgressSink::new(
            Arc::new(reporter.clone()),
            flags.clone(),
            "Save to cloud",
            "Syncing",
            10_000,
        );
        (sink, flags)
    }

    #[test]
    fn test_ticks_are_rounded() {
        let reporter = FakeReporter::default();
        let (sink, _) = sink(&reporter);

        for p in [0.0, 0.00004, 0.00006, 0.1234, 0.33333, 1.0] {
            sink.report(p).unwrap();
        }

        assert_eq!(reporter.ticks(), vec![0, 0, 1, 1234, 3333, 10_000]);
        assert_eq!(reporter.shown(), 1);
    }

    #[test]
    fn test_ticks_monotonic_for_monotonic_progress() {
        let reporter = FakeReporter::default();
        let (sink, _) = sink(&reporter);

        for i in 0..=200 {
            sink.report(i as f64 / 200.0).unwrap();
        }

        let ticks = reporter.ticks();
        assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ticks.last(), Some(&10_000));
    }

    #[test]
    fn test_invalid_progress_rejected() {
        let reporter = FakeReporter::default();
        let (sink, _) = sink(&reporter);

        assert!(matches!(sink.report(1.5), Err(SyncError::InvalidProgress(_))));
        assert!(matches!(
            sink.report(f64::NAN),
            Err(SyncError::InvalidProgress(_))
        ));
        assert_eq!(reporter.shown(), 0);
    }

    #[test]
    fn test_cancel_records_flag_and_releases_handle() {
        let reporter = FakeReporter::default();
        let (sink, flags) = sink(&reporter);
        reporter.respond_with(ProgressResult::Cancelled);

        assert_eq!(sink.report(0.3).unwrap(), ProgressSignal::Continue);
        assert!(flags.closing_cancelled());
        assert!(!sink.is_visible());
        assert_eq!(reporter.dropped(), 1);

        // No new indicator after the user gave up waiting.
        assert_eq!(sink.report(0.4).unwrap(), ProgressSignal::Continue);
        assert_eq!(reporter.shown(), 1);
    }

    #[test]
    fn test_stop_halts_and_releases_handle() {
        let reporter = FakeReporter::default();
        let (sink, flags) = sink(&reporter);
        reporter.respond_with(ProgressResult::Stopped);

        assert_eq!(sink.report(0.3).unwrap(), ProgressSignal::Halt);
        assert!(flags.stop_requested());
        assert!(!flags.closing_cancelled());
        assert!(!sink.is_visible());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let reporter = FakeReporter::default();
        let (sink, _) = sink(&reporter);

        sink.ensure_visible();
        sink.ensure_visible();
        assert_eq!(reporter.shown(), 1);

        sink.reset();
        sink.reset();
        assert_eq!(reporter.dropped(), 1);
        assert!(!sink.is_visible());
    }

    #[test]
    fn test_custom_resolution() {
        let reporter = FakeReporter::default();
        let flags = Arc::new(SyncFlags::new());
        let sink = ProgressSink::new(Arc::new(reporter.clone()), flags, "t", "m", 100);

        sink.report(0.255).unwrap();
        assert_eq!(reporter.state.lock().unwrap().polls, vec![(26, 100)]);
    }
}
