//! Progress Indicator Abstractions
//!
//! A host-provided, cancellable progress indicator. The core asks the host to
//! materialize an indicator once and then polls the returned handle with a
//! tick value; each poll reports whether the user asked to cancel or stop.

use serde::{Deserialize, Serialize};

/// Buttons the progress indicator should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressOptions {
    /// Show a "Cancel" button
    pub show_cancel: bool,
    /// Show a "Stop" button
    pub show_stop: bool,
}

impl ProgressOptions {
    /// Indicator with both "Cancel" and "Stop" buttons.
    pub fn cancel_and_stop() -> Self {
        Self {
            show_cancel: true,
            show_stop: true,
        }
    }
}

/// User response observed while polling a progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressResult {
    /// Nothing happened, keep going
    Continue,
    /// The user pressed "Cancel"
    Cancelled,
    /// The user pressed "Stop"
    Stopped,
}

/// A live progress indicator.
///
/// Dropping the handle must remove the indicator from the screen.
pub trait ProgressHandle: Send {
    /// Update the indicator with `value` out of `max` ticks and report the
    /// user's response since the previous poll.
    fn poll(&mut self, value: u64, max: u64) -> ProgressResult;
}

/// Factory for progress indicators.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::progress::{ProgressOptions, ProgressReporter, ProgressResult};
///
/// fn wait(reporter: &dyn ProgressReporter) {
///     let mut handle = reporter.show_progress(
///         "Save to cloud",
///         "Project is syncing",
///         ProgressOptions::cancel_and_stop(),
///     );
///     if handle.poll(5_000, 10_000) == ProgressResult::Cancelled {
///         // user gave up waiting
///     }
/// }
/// ```
pub trait ProgressReporter: Send + Sync {
    /// Materialize a visible indicator.
    fn show_progress(
        &self,
        title: &str,
        message: &str,
        options: ProgressOptions,
    ) -> Box<dyn ProgressHandle>;
}
