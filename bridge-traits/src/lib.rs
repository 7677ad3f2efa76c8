//! # Host Bridge Traits
//!
//! Capability contracts the cloud-sync core consumes from its host.
//!
//! ## Overview
//!
//! The sync orchestrator never talks to a network, a window system or a file
//! format directly. Everything it needs from the outside world is expressed as a
//! trait in this crate and injected by the host application (desktop shell,
//! headless test harness, ...).
//!
//! ## Traits
//!
//! ### Presentation
//! - [`ProgressReporter`](progress::ProgressReporter) / [`ProgressHandle`](progress::ProgressHandle) -
//!   materialize a cancellable progress indicator and poll it
//! - [`PromptService`](prompt::PromptService) - block until the user picks one
//!   option of a recovery dialog or dismisses a notice
//!
//! ### Project & Sync
//! - [`ProjectStore`](project::ProjectStore) - local resave, reopen, save counter
//! - [`SyncLauncher`](project::SyncLauncher) - start a new cloud sync in a given [`SaveMode`]
//!
//! ### Security & Storage
//! - [`CredentialStore`](storage::CredentialStore) - drop the stored cloud credentials
//! - [`SecureStore`](storage::SecureStore) - generic secret persistence (Keychain/Keystore)
//!
//! ### Diagnostics
//! - [`LoggerSink`](logger::LoggerSink) - forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep messages actionable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` (progress handles only `Send`) so bridge
//! objects can be shared across the orchestrator's tasks behind an `Arc`.

pub mod error;
pub mod logger;
pub mod progress;
pub mod project;
pub mod prompt;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use progress::{ProgressHandle, ProgressOptions, ProgressReporter, ProgressResult};
pub use project::{ProjectId, ProjectStore, SaveMode, SyncLauncher};
pub use prompt::{Choice, PromptContext, PromptKind, PromptService};
pub use storage::{CredentialStore, SecureStore};
