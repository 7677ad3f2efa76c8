//! # Cloud Sync Orchestration
//!
//! Observes the background upload of a project to the cloud and reacts to it.
//!
//! ## Overview
//!
//! This crate reflects sync progress to the host, decides whether the project
//! may be closed while an upload is running, announces the first successful
//! sync and turns terminal sync failures into recovery flows (re-authorize,
//! resolve limits, resolve conflicts, recreate missing projects, report).
//!
//! ## Components
//!
//! - **Progress Sink** (`progress`): Single-slot owner of the host progress indicator
//! - **Closing Gate** (`closing_gate`): Cooperative wait-to-close loop
//! - **First Sync Announcer** (`announcer`): One-time success notice
//! - **Recovery** (`recovery`): Failure classification and remediation
//! - **Sync Orchestrator** (`orchestrator`): Per-project composition of the above
//! - **Credentials** (`credentials`): Secure-store backed credential unlinking

pub mod announcer;
pub mod closing_gate;
pub mod credentials;
pub mod error;
pub mod flags;
pub mod orchestrator;
pub mod progress;
pub mod recovery;

pub use announcer::{AnnouncementOutcome, FirstSyncAnnouncer};
pub use closing_gate::ClosingGate;
pub use credentials::SecureStoreCredentials;
pub use error::{Result, SyncError};
pub use flags::SyncFlags;
pub use orchestrator::{OrchestratorEvent, SyncBridges, SyncBridgesBuilder, SyncOrchestrator};
pub use progress::{ProgressSignal, ProgressSink};
pub use recovery::{
    ErrorClassifier, RecoveryAction, RecoveryBridges, RecoveryDispatcher, RecoveryFlow,
    RecoveryOutcome,
};
