//! # Sync Status Events
//!
//! The status model published by the background sync process and the
//! [`StatusBus`] that carries it to observers.
//!
//! ## Overview
//!
//! - **Status Types**: [`SyncStatus`] snapshots with a [`SyncState`], a progress
//!   fraction and, for failures, a [`CloudSyncError`]
//! - **StatusBus**: broadcast channel that also retains the latest snapshot
//! - **StatusSubscription**: receiver that can replay the current snapshot first
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   publish   ┌───────────┐   subscribe(true)   ┌──────────────┐
//! │ Sync process ├────────────>│ StatusBus ├────────────────────>│ Orchestrator │
//! └──────────────┘             │ (current +│                     └──────────────┘
//!                              │ broadcast)│   subscribe(false)  ┌──────────────┐
//!                              │           ├────────────────────>│  Other view  │
//!                              └───────────┘                     └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{StatusBus, SyncStatus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = StatusBus::new(16);
//! bus.publish(SyncStatus::syncing(0.25));
//!
//! // A late subscriber still learns the current status.
//! let mut subscription = bus.subscribe(true);
//! let status = subscription.recv().await.unwrap();
//! assert!(status.is_syncing());
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Delivery uses `tokio::sync::broadcast`:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` snapshots. Non-fatal;
//!   the next snapshot is always the most recent state anyway.
//! - **`RecvError::Closed`**: the bus was dropped. Subscribers should exit.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::RecvError;

/// Default buffer size for the status channel.
pub const DEFAULT_STATUS_BUFFER_SIZE: usize = 64;

// ============================================================================
// Status Types
// ============================================================================

/// Lifecycle state of the cloud sync of one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No sync has run or the last one was discarded
    Idle,
    /// Upload in progress
    Syncing,
    /// The last sync completed
    Succeeded,
    /// The last sync failed; the status carries the error
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Succeeded => "succeeded",
            SyncState::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad family a failure belongs to, used to pick how it is remediated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Retry after remediation (re-authenticate, reconnect)
    TransportOrAuth,
    /// User choice plus local fallback
    ResourceLimit,
    /// Explicit user-directed resolution
    Consistency,
    /// Not locally diagnosable, reported only
    Opaque,
    /// Expected outcome of a user cancel
    NotAnError,
}

/// Terminal failure kinds reported by the sync process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    Authorization,
    ProjectLimitReached,
    ProjectStorageLimitReached,
    ProjectVersionConflict,
    ProjectNotFound,
    Network,
    DataUploadFailed,
    Server,
    ClientFailure,
    Cancelled,
}

impl SyncErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [SyncErrorKind; 10] = [
        SyncErrorKind::Authorization,
        SyncErrorKind::ProjectLimitReached,
        SyncErrorKind::ProjectStorageLimitReached,
        SyncErrorKind::ProjectVersionConflict,
        SyncErrorKind::ProjectNotFound,
        SyncErrorKind::Network,
        SyncErrorKind::DataUploadFailed,
        SyncErrorKind::Server,
        SyncErrorKind::ClientFailure,
        SyncErrorKind::Cancelled,
    ];

    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncErrorKind::Authorization | SyncErrorKind::Network => ErrorCategory::TransportOrAuth,
            SyncErrorKind::ProjectLimitReached | SyncErrorKind::ProjectStorageLimitReached => {
                ErrorCategory::ResourceLimit
            }
            SyncErrorKind::ProjectVersionConflict | SyncErrorKind::ProjectNotFound => {
                ErrorCategory::Consistency
            }
            SyncErrorKind::DataUploadFailed
            | SyncErrorKind::Server
            | SyncErrorKind::ClientFailure => ErrorCategory::Opaque,
            SyncErrorKind::Cancelled => ErrorCategory::NotAnError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::Authorization => "authorization",
            SyncErrorKind::ProjectLimitReached => "project_limit_reached",
            SyncErrorKind::ProjectStorageLimitReached => "project_storage_limit_reached",
            SyncErrorKind::ProjectVersionConflict => "project_version_conflict",
            SyncErrorKind::ProjectNotFound => "project_not_found",
            SyncErrorKind::Network => "network",
            SyncErrorKind::DataUploadFailed => "data_upload_failed",
            SyncErrorKind::Server => "server",
            SyncErrorKind::ClientFailure => "client_failure",
            SyncErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal sync failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSyncError {
    pub kind: SyncErrorKind,
    /// Raw diagnostic message from the service or transport
    pub message: String,
}

impl CloudSyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CloudSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Immutable snapshot of the sync status of one project.
///
/// `error` is present if and only if `state == Failed`; the constructors
/// below are the only way this crate builds statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Upload progress in `[0, 1]`
    pub progress: f64,
    pub error: Option<CloudSyncError>,
}

impl SyncStatus {
    /// Checked constructor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatus`] if the progress is not a finite value
    /// in `[0, 1]` or if the error/state pairing is inconsistent.
    pub fn new(state: SyncState, progress: f64, error: Option<CloudSyncError>) -> Result<Self> {
        if !progress.is_finite() || !(0.0..=1.0).contains(&progress) {
            return Err(Error::InvalidStatus(format!(
                "progress {} is outside [0, 1]",
                progress
            )));
        }

        match (state, error.is_some()) {
            (SyncState::Failed, false) => Err(Error::InvalidStatus(
                "failed status requires an error".to_string(),
            )),
            (other, true) if other != SyncState::Failed => Err(Error::InvalidStatus(format!(
                "{} status cannot carry an error",
                other
            ))),
            _ => Ok(Self {
                state,
                progress,
                error,
            }),
        }
    }

    pub fn idle() -> Self {
        Self {
            state: SyncState::Idle,
            progress: 0.0,
            error: None,
        }
    }

    /// Syncing status; the progress is clamped into `[0, 1]` and NaN maps to 0.
    pub fn syncing(progress: f64) -> Self {
        Self {
            state: SyncState::Syncing,
            progress: clamp_fraction(progress),
            error: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            state: SyncState::Succeeded,
            progress: 1.0,
            error: None,
        }
    }

    pub fn failed(error: CloudSyncError) -> Self {
        Self {
            state: SyncState::Failed,
            progress: 0.0,
            error: Some(error),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.state == SyncState::Syncing
    }

    /// The attached error when this is a failure.
    pub fn failure(&self) -> Option<&CloudSyncError> {
        match self.state {
            SyncState::Failed => self.error.as_ref(),
            _ => None,
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::idle()
    }
}

fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Convert raw upload byte counters into a progress fraction.
///
/// Transports report `total <= 0` while the payload size is still unknown;
/// that is treated as no progress.
pub fn progress_fraction(current: i64, total: i64) -> f64 {
    let (current, total) = if total <= 0 { (0, 1) } else { (current, total) };
    clamp_fraction(current as f64 / total as f64)
}

// ============================================================================
// Status Bus
// ============================================================================

/// Broadcast channel for [`SyncStatus`] snapshots that remembers the latest one.
///
/// Cloning the bus yields another handle to the same channel.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{StatusBus, SyncStatus};
///
/// let bus = StatusBus::new(16);
/// let _subscription = bus.subscribe(false);
/// assert_eq!(bus.publish(SyncStatus::syncing(0.5)), 1);
/// assert!(bus.current().is_syncing());
/// ```
#[derive(Clone)]
pub struct StatusBus {
    sender: broadcast::Sender<SyncStatus>,
    current: Arc<RwLock<SyncStatus>>,
}

impl StatusBus {
    /// Creates a new bus buffering up to `capacity` snapshots per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            current: Arc::new(RwLock::new(SyncStatus::idle())),
        }
    }

    /// Publishes a snapshot to all subscribers and records it as current.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, status: SyncStatus) -> usize {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = status.clone();
        // No subscribers is not an error for a status feed.
        self.sender.send(status).unwrap_or(0)
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> SyncStatus {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Creates a new subscription.
    ///
    /// With `deliver_current`, the first `recv()` yields the snapshot that was
    /// current at subscription time. Every later snapshot is delivered exactly
    /// once either way.
    pub fn subscribe(&self, deliver_current: bool) -> StatusSubscription {
        // Holding the read lock keeps `publish` from slipping a snapshot in
        // between reading the current value and attaching the receiver.
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let receiver = self.sender.subscribe();
        StatusSubscription {
            receiver,
            pending: deliver_current.then(|| current.clone()),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_BUFFER_SIZE)
    }
}

impl fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("current", &self.current().state)
            .finish()
    }
}

/// Receiving end of a [`StatusBus`]. Dropping it unsubscribes.
pub struct StatusSubscription {
    receiver: broadcast::Receiver<SyncStatus>,
    pending: Option<SyncStatus>,
}

impl StatusSubscription {
    /// Receives the next snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` snapshots.
    /// Returns `RecvError::Closed` if the bus was dropped.
    pub async fn recv(&mut self) -> std::result::Result<SyncStatus, RecvError> {
        if let Some(status) = self.pending.take() {
            return Ok(status);
        }
        self.receiver.recv().await
    }

    /// Attempts to receive a snapshot without waiting.
    ///
    /// Returns `None` if nothing is available.
    pub fn try_recv(&mut self) -> Option<std::result::Result<SyncStatus, RecvError>> {
        if let Some(status) = self.pending.take() {
            return Some(Ok(status));
        }
        match self.receiver.try_recv() {
            Ok(status) => Some(Ok(status)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Lagged(n)) => Some(Err(RecvError::Lagged(n))),
            Err(broadcast::error::TryRecvError::Closed) => Some(Err(RecvError::Closed)),
        }
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("has_pending", &self.pending.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
