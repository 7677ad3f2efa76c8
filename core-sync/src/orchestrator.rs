//! # Sync Orchestrator
//!
//! Per-project composition of the progress sink, the closing gate, the first
//! sync announcer and the recovery dispatcher.
//!
//! ## Overview
//!
//! A [`SyncOrchestrator`] is attached when a project is opened and detached
//! when it is closed. While attached it:
//! - Tracks whether a cloud sync is running
//! - Mirrors upload progress onto the host progress indicator
//! - Answers [`allow_closing`](SyncOrchestrator::allow_closing) for the host
//! - Shows the first-sync notice once
//! - Runs the recovery flow for every failed sync
//!
//! ## Tasks
//!
//! ```text
//!  StatusBus ──> status task ──(follow-ups, bounded mpsc)──> recovery task ──> prompts / bridges
//!                   │
//!                   ├─ SyncFlags (atomics) <── ClosingGate (caller task)
//!                   └─ Notify ───────────────> ClosingGate wake-up
//! ```
//!
//! The status task never waits on the user. Prompts and re-triggered syncs run
//! on the recovery task, strictly after the status that caused them has been
//! fully processed. The hand-off never blocks: while the recovery task is busy
//! and its queue is full, further follow-ups are dropped with a warning.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_runtime::config::OrchestratorConfig;
//! use core_sync::{SyncBridges, SyncOrchestrator};
//!
//! let bridges = SyncBridges::builder()
//!     .progress_reporter(reporter)
//!     .prompt_service(prompts)
//!     .project_store(projects)
//!     .sync_launcher(launcher)
//!     .secure_store(secure_store)
//!     .build()?;
//!
//! let orchestrator =
//!     SyncOrchestrator::attach(project_id, &status_bus, bridges, OrchestratorConfig::default())?;
//!
//! if orchestrator.allow_closing().await {
//!     orchestrator.detach()?;
//! }
//! ```

use crate::announcer::{announce, AnnouncementOutcome, FirstSyncAnnouncer};
use crate::closing_gate::ClosingGate;
use crate::credentials::SecureStoreCredentials;
use crate::error::{Result, SyncError};
use crate::flags::SyncFlags;
use crate::progress::{ProgressSignal, ProgressSink};
use crate::recovery::{RecoveryBridges, RecoveryDispatcher, RecoveryOutcome};
use bridge_traits::{
    ConsoleLogger, CredentialStore, LoggerSink, ProgressReporter, ProjectId, ProjectStore,
    PromptService, SecureStore, SyncLauncher,
};
use core_runtime::config::OrchestratorConfig;
use core_runtime::events::{
    CloudSyncError, RecvError, StatusBus, StatusSubscription, SyncStatus,
};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Bridges
// ============================================================================

/// Host capabilities the orchestrator depends on.
#[derive(Clone)]
pub struct SyncBridges {
    pub progress: Arc<dyn ProgressReporter>,
    pub prompts: Arc<dyn PromptService>,
    pub projects: Arc<dyn ProjectStore>,
    pub launcher: Arc<dyn SyncLauncher>,
    pub credentials: Arc<dyn CredentialStore>,
    pub logger: Arc<dyn LoggerSink>,
}

impl SyncBridges {
    pub fn builder() -> SyncBridgesBuilder {
        SyncBridgesBuilder::default()
    }

    fn recovery(&self) -> RecoveryBridges {
        RecoveryBridges {
            prompts: self.prompts.clone(),
            projects: self.projects.clone(),
            launcher: self.launcher.clone(),
            credentials: self.credentials.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl fmt::Debug for SyncBridges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBridges")
            .field("progress", &"ProgressReporter { ... }")
            .field("prompts", &"PromptService { ... }")
            .field("projects", &"ProjectStore { ... }")
            .field("launcher", &"SyncLauncher { ... }")
            .field("credentials", &"CredentialStore { ... }")
            .field("logger", &"LoggerSink { ... }")
            .finish()
    }
}

/// Builder for [`SyncBridges`].
///
/// Every bridge except the logger sink is required. Without a logger sink,
/// diagnostics go to a [`ConsoleLogger`].
#[derive(Default)]
pub struct SyncBridgesBuilder {
    progress: Option<Arc<dyn ProgressReporter>>,
    prompts: Option<Arc<dyn PromptService>>,
    projects: Option<Arc<dyn ProjectStore>>,
    launcher: Option<Arc<dyn SyncLauncher>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    logger: Option<Arc<dyn LoggerSink>>,
}

impl SyncBridgesBuilder {
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    pub fn prompt_service(mut self, prompts: Arc<dyn PromptService>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn project_store(mut self, projects: Arc<dyn ProjectStore>) -> Self {
        self.projects = Some(projects);
        self
    }

    pub fn sync_launcher(mut self, launcher: Arc<dyn SyncLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn credential_store(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Unlink credentials by deleting them from `store`.
    pub fn secure_store(self, store: Arc<dyn SecureStore>) -> Self {
        self.credential_store(Arc::new(SecureStoreCredentials::new(store)))
    }

    pub fn logger_sink(mut self, logger: Arc<dyn LoggerSink>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// # Errors
    ///
    /// Returns [`core_runtime::Error::CapabilityMissing`] naming the first
    /// required bridge that was not provided.
    pub fn build(self) -> core_runtime::Result<SyncBridges> {
        Ok(SyncBridges {
            progress: self.progress.ok_or_else(|| {
                missing(
                    "ProgressReporter",
                    "Required to show sync progress. Use .progress_reporter() to set it.",
                )
            })?,
            prompts: self.prompts.ok_or_else(|| {
                missing(
                    "PromptService",
                    "Required for recovery dialogs. Use .prompt_service() to set it.",
                )
            })?,
            projects: self.projects.ok_or_else(|| {
                missing(
                    "ProjectStore",
                    "Required for local resave and reopen. Use .project_store() to set it.",
                )
            })?,
            launcher: self.launcher.ok_or_else(|| {
                missing(
                    "SyncLauncher",
                    "Required to re-trigger cloud syncs. Use .sync_launcher() to set it.",
                )
            })?,
            credentials: self.credentials.ok_or_else(|| {
                missing(
                    "CredentialStore",
                    "Required to unlink credentials after authorization failures. \
                     Use .credential_store() or .secure_store() to set it.",
                )
            })?,
            logger: self
                .logger
                .unwrap_or_else(|| Arc::new(ConsoleLogger::default()) as Arc<dyn LoggerSink>),
        })
    }
}

fn missing(capability: &str, message: &str) -> core_runtime::Error {
    core_runtime::Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

// ============================================================================
// Events
// ============================================================================

/// Follow-up work completed by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "outcome", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// The first-sync notice was shown
    Announced(AnnouncementOutcome),
    /// A failed sync went through its recovery flow
    Recovered(RecoveryOutcome),
}

enum FollowUp {
    Announce,
    Recover(CloudSyncError),
}

impl FollowUp {
    fn name(&self) -> &'static str {
        match self {
            FollowUp::Announce => "announce",
            FollowUp::Recover(error) => error.kind.as_str(),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Cloud sync companion of one open project.
///
/// Dropping the orchestrator detaches it.
pub struct SyncOrchestrator {
    project: ProjectId,
    flags: Arc<SyncFlags>,
    sink: Arc<ProgressSink>,
    gate: ClosingGate,
    status_changed: Arc<Notify>,
    events: broadcast::Sender<OrchestratorEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncOrchestrator {
    /// Subscribe to `bus` (receiving its current status first) and start the
    /// status and recovery tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or no Tokio runtime is running.
    #[instrument(skip_all, fields(project = %project))]
    pub fn attach(
        project: ProjectId,
        bus: &StatusBus,
        bridges: SyncBridges,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            core_runtime::Error::Internal(format!("SyncOrchestrator requires a Tokio runtime: {}", e))
        })?;

        let flags = Arc::new(SyncFlags::new());
        let status_changed = Arc::new(Notify::new());
        let sink = Arc::new(ProgressSink::new(
            bridges.progress.clone(),
            flags.clone(),
            config.wait_dialog_title.clone(),
            config.wait_dialog_message.clone(),
            config.progress_resolution,
        ));
        let gate = ClosingGate::new(
            flags.clone(),
            sink.clone(),
            status_changed.clone(),
            config.close_poll_interval,
        );
        let (events, _) = broadcast::channel(config.event_buffer_size);
        let (follow_ups, queue) = mpsc::channel(config.recovery_queue_size);

        let recovery = RecoveryWorker {
            project,
            prompts: bridges.prompts.clone(),
            dispatcher: RecoveryDispatcher::new(project, bridges.recovery(), &config),
            events: events.clone(),
        };
        let status = StatusWorker {
            project,
            flags: flags.clone(),
            sink: sink.clone(),
            announcer: FirstSyncAnnouncer::new(project, bridges.projects.clone()),
            status_changed: status_changed.clone(),
            follow_ups,
        };

        let subscription = bus.subscribe(true);
        let tasks = vec![
            runtime.spawn(status.run(subscription)),
            runtime.spawn(recovery.run(queue)),
        ];

        info!("Cloud sync orchestrator attached");

        Ok(Self {
            project,
            flags,
            sink,
            gate,
            status_changed,
            events,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn is_syncing(&self) -> bool {
        self.flags.is_syncing()
    }

    pub fn closing_cancelled(&self) -> bool {
        self.flags.closing_cancelled()
    }

    pub fn last_progress(&self) -> f64 {
        self.flags.last_progress()
    }

    pub fn is_attached(&self) -> bool {
        !self.flags.is_detached()
    }

    /// Stream of completed follow-ups (announcements and recoveries).
    pub fn events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Whether the project may be closed now, waiting for a running sync if needed.
    ///
    /// - Not syncing: `true` at once, no indicator
    /// - Sync ends while waiting: `true`
    /// - User cancels the wait: `true`, the sync keeps running
    /// - User presses "Stop": `false`
    pub async fn allow_closing(&self) -> bool {
        if self.flags.is_detached() {
            return true;
        }
        self.gate.allow_closing().await
    }

    /// Unsubscribe from the status bus and stop the background tasks.
    ///
    /// Queued recoveries that have not started yet are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyDetached`] if called more than once.
    pub fn detach(&self) -> Result<()> {
        if !self.flags.mark_detached() {
            return Err(SyncError::AlreadyDetached);
        }

        let tasks = std::mem::take(
            &mut *self
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for task in tasks {
            task.abort();
        }

        self.sink.reset();
        self.status_changed.notify_waiters();
        info!(project = %self.project, "Cloud sync orchestrator detached");
        Ok(())
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("project", &self.project)
            .field("syncing", &self.is_syncing())
            .field("closing_cancelled", &self.closing_cancelled())
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ============================================================================
// Workers
// ============================================================================

struct StatusWorker {
    project: ProjectId,
    flags: Arc<SyncFlags>,
    sink: Arc<ProgressSink>,
    announcer: FirstSyncAnnouncer,
    status_changed: Arc<Notify>,
    follow_ups: mpsc::Sender<FollowUp>,
}

impl StatusWorker {
    async fn run(mut self, mut subscription: StatusSubscription) {
        loop {
            let status = match subscription.recv().await {
                Ok(status) => status,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(project = %self.project, skipped, "Status handler lagged behind");
                    continue;
                }
                Err(RecvError::Closed) => {
                    debug!(project = %self.project, "Status bus closed");
                    break;
                }
            };

            if self.flags.is_detached() {
                break;
            }
            self.handle(status).await;
        }
    }

    #[instrument(skip(self, status), fields(project = %self.project, state = %status.state))]
    async fn handle(&mut self, status: SyncStatus) {
        if let Err(e) = validate(&status) {
            warn!("{}", e);
        }

        let syncing = status.is_syncing();
        let was_syncing = self.flags.set_syncing(syncing);
        let announce = self.announcer.on_status(was_syncing, &status).await;

        if syncing {
            if (0.0..=1.0).contains(&status.progress) {
                self.flags.set_last_progress(status.progress);
            }
            match self.sink.report(status.progress) {
                Ok(ProgressSignal::Continue) => {}
                Ok(ProgressSignal::Halt) => debug!("Stop requested while syncing"),
                Err(e) => warn!("Ignoring progress update: {}", e),
            }
        } else {
            self.sink.reset();
        }

        self.status_changed.notify_waiters();

        if announce {
            self.dispatch(FollowUp::Announce);
        }
        if let Some(error) = status.failure() {
            debug!(kind = %error.kind, "Queueing recovery");
            self.dispatch(FollowUp::Recover(error.clone()));
        }
    }

    /// Never waits: a full queue drops the follow-up.
    fn dispatch(&self, follow_up: FollowUp) {
        match self.follow_ups.try_send(follow_up) {
            Ok(()) => {}
            Err(TrySendError::Full(follow_up)) => {
                warn!(
                    project = %self.project,
                    follow_up = follow_up.name(),
                    "Recovery queue full, follow-up dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!(project = %self.project, "Recovery task stopped, follow-up dropped");
            }
        }
    }
}

fn validate(status: &SyncStatus) -> Result<()> {
    SyncStatus::new(status.state, status.progress, status.error.clone())
        .map(|_| ())
        .map_err(|e| SyncError::InvalidStatus(e.to_string()))
}

struct RecoveryWorker {
    project: ProjectId,
    prompts: Arc<dyn PromptService>,
    dispatcher: RecoveryDispatcher,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl RecoveryWorker {
    async fn run(self, mut queue: mpsc::Receiver<FollowUp>) {
        while let Some(follow_up) = queue.recv().await {
            let event = match follow_up {
                FollowUp::Announce => {
                    OrchestratorEvent::Announced(announce(self.prompts.as_ref(), self.project).await)
                }
                FollowUp::Recover(error) => {
                    OrchestratorEvent::Recovered(self.dispatcher.recover(&error).await)
                }
            };
            // Nobody listening is fine.
            let _ = self.events.send(event);
        }
        debug!(project = %self.project, "Recovery task finished");
    }
}
