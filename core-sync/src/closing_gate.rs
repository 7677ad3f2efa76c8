//! # Closing Gate
//!
//! Answers "may the project be closed now?" while a cloud sync may still be
//! uploading.
//!
//! ## Workflow
//!
//! 1. Not syncing: closing is allowed immediately, no indicator is shown.
//! 2. Syncing: a cancel/stop capable indicator is shown and polled with the
//!    last known progress. Between polls the gate suspends until the next
//!    status change or the poll interval elapses.
//! 3. The wait ends when:
//!    - the sync finishes or fails (`true`)
//!    - the user cancels the wait, choosing to close without waiting (`true`)
//!    - the user presses "Stop", keeping the project open (`false`)
//!
//! Cancelling the wait never cancels the sync itself.

use crate::flags::SyncFlags;
use crate::progress::{ProgressSignal, ProgressSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, instrument, warn};

/// Cooperative wait-to-close loop.
#[derive(Debug, Clone)]
pub struct ClosingGate {
    flags: Arc<SyncFlags>,
    sink: Arc<ProgressSink>,
    status_changed: Arc<Notify>,
    poll_interval: Duration,
}

impl ClosingGate {
    /// `status_changed` must be notified after every processed status event.
    pub fn new(
        flags: Arc<SyncFlags>,
        sink: Arc<ProgressSink>,
        status_changed: Arc<Notify>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            flags,
            sink,
            status_changed,
            poll_interval,
        }
    }

    #[instrument(skip(self))]
    pub async fn allow_closing(&self) -> bool {
        self.flags.clear_stop_request();

        if !self.flags.is_syncing() {
            return true;
        }

        loop {
            // Registered before the checks so a status change in between
            // still wakes this iteration.
            let changed = self.status_changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if !self.flags.is_syncing() {
                debug!("Sync finished while waiting to close");
                self.sink.reset();
                return true;
            }
            if self.flags.closing_cancelled() {
                debug!("Closing without waiting for sync");
                return true;
            }
            if self.flags.stop_requested() {
                debug!("Closing aborted by stop request");
                return false;
            }

            self.sink.ensure_visible();
            match self.sink.report(self.flags.last_progress()) {
                Ok(ProgressSignal::Halt) => continue,
                Ok(ProgressSignal::Continue) => {}
                Err(e) => warn!("Failed to update closing indicator: {}", e),
            }
            if self.flags.closing_cancelled() {
                continue;
            }

            let _ = tokio::time::timeout(self.poll_interval, changed).await;
        }
    }
}
