//! # Failure Recovery
//!
//! Turns a terminal sync failure into the remediation the user agrees to.
//!
//! ## Overview
//!
//! Recovery happens in two steps:
//!
//! 1. **Plan**: [`ErrorClassifier`] maps the failure kind to a [`RecoveryFlow`],
//!    and [`RecoveryDispatcher::plan`] asks the user whatever that flow needs to
//!    know. The result is a [`RecoveryOutcome`]: the ordered list of
//!    [`RecoveryAction`]s to perform.
//! 2. **Apply**: [`RecoveryDispatcher::apply`] performs the actions against the
//!    host bridges, then writes the diagnostic record for the failure.
//!
//! ## Flows
//!
//! | Failure kind                                   | Actions |
//! |------------------------------------------------|---------|
//! | `Authorization`                                | unlink credentials, sync `Normal` |
//! | `ProjectLimitReached`, `ProjectStorageLimitReached` | visit service: wait for the external action, sync `Normal`; otherwise resave locally, sync `Normal` if that fails |
//! | `ProjectVersionConflict`                       | use local: sync `ForceSave`; otherwise reopen from the remote copy |
//! | `ProjectNotFound`                              | save locally: resave, sync `SaveNew` if that fails; otherwise sync `SaveNew` |
//! | `Network`                                      | connection issues notice |
//! | `DataUploadFailed`, `Server`, `ClientFailure`  | failure notice with the raw message attached |
//! | `Cancelled`                                    | nothing |
//!
//! Errors from the host never leave this module: they are logged and the
//! remaining actions still run.

use crate::error::SyncError;
use bridge_traits::{
    Choice, CredentialStore, LogEntry, LogLevel, LoggerSink, ProjectId, ProjectStore,
    PromptContext, PromptKind, PromptService, SaveMode, SyncLauncher,
};
use core_runtime::config::OrchestratorConfig;
use core_runtime::events::{CloudSyncError, SyncErrorKind};
use core_runtime::logging::redact_emails;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Log target of the diagnostic record written for every failure.
pub const DIAGNOSTIC_TARGET: &str = "core_sync::recovery";

/// Remediation family a failure kind belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryFlow {
    /// Forget the credentials and try again
    Reauthorize,
    /// Project count or storage quota exhausted
    ResolveLimit,
    /// Remote copy diverged
    ResolveConflict,
    /// Remote project is gone
    ResolveMissingProject,
    /// Connectivity notice
    ReportConnection,
    /// Generic failure notice
    ReportFailure,
    /// Expected outcome of a user cancel
    Ignore,
}

/// Maps failure kinds onto recovery flows.
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify(kind: SyncErrorKind) -> RecoveryFlow {
        match kind {
            SyncErrorKind::Authorization => RecoveryFlow::Reauthorize,
            SyncErrorKind::ProjectLimitReached | SyncErrorKind::ProjectStorageLimitReached => {
                RecoveryFlow::ResolveLimit
            }
            SyncErrorKind::ProjectVersionConflict => RecoveryFlow::ResolveConflict,
            SyncErrorKind::ProjectNotFound => RecoveryFlow::ResolveMissingProject,
            SyncErrorKind::Network => RecoveryFlow::ReportConnection,
            SyncErrorKind::DataUploadFailed
            | SyncErrorKind::Server
            | SyncErrorKind::ClientFailure => RecoveryFlow::ReportFailure,
            SyncErrorKind::Cancelled => RecoveryFlow::Ignore,
        }
    }
}

/// One follow-up step of a recovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Drop the stored cloud credentials
    UnlinkCredentials,
    /// Block on the "complete your action online" prompt
    AwaitExternalAction,
    /// Save locally; start a sync in `fallback` mode if that does not succeed
    ResaveLocally { fallback: SaveMode },
    /// Start a new cloud sync
    TriggerSync(SaveMode),
    /// Reload the project from its remote copy
    ReopenProject,
    /// Passive connectivity notice
    NotifyConnectionIssue,
    /// Passive failure notice carrying the raw diagnostic message
    ReportFailure { message: String },
}

/// What one failure resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryOutcome {
    pub kind: SyncErrorKind,
    pub flow: RecoveryFlow,
    pub actions: Vec<RecoveryAction>,
}

impl RecoveryOutcome {
    /// Sync modes this outcome may start, in order. A `ResaveLocally` fallback
    /// is included even though it only runs if the resave fails.
    pub fn sync_modes(&self) -> Vec<SaveMode> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                RecoveryAction::TriggerSync(mode) => Some(*mode),
                RecoveryAction::ResaveLocally { fallback } => Some(*fallback),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Host capabilities the recovery flows act through
#[derive(Clone)]
pub struct RecoveryBridges {
    pub prompts: Arc<dyn PromptService>,
    pub projects: Arc<dyn ProjectStore>,
    pub launcher: Arc<dyn SyncLauncher>,
    pub credentials: Arc<dyn CredentialStore>,
    pub logger: Arc<dyn LoggerSink>,
}

/// Runs the recovery flow for failures of one project.
pub struct RecoveryDispatcher {
    project: ProjectId,
    bridges: RecoveryBridges,
    failure_notice_title: String,
    failure_notice_message: String,
    external_action_message: String,
}

impl RecoveryDispatcher {
    pub fn new(project: ProjectId, bridges: RecoveryBridges, config: &OrchestratorConfig) -> Self {
        Self {
            project,
            bridges,
            failure_notice_title: config.failure_notice_title.clone(),
            failure_notice_message: config.failure_notice_message.clone(),
            external_action_message: config.external_action_message.clone(),
        }
    }

    /// Plan, apply and log the recovery for one failure.
    #[instrument(skip(self, error), fields(project = %self.project, kind = %error.kind))]
    pub async fn recover(&self, error: &CloudSyncError) -> RecoveryOutcome {
        let outcome = self.plan(error).await;
        debug!(actions = outcome.actions.len(), "Recovery planned");
        self.apply(&outcome).await;
        self.log_diagnostic(error).await;
        outcome
    }

    /// Ask the user what the flow needs and return the actions to take.
    pub async fn plan(&self, error: &CloudSyncError) -> RecoveryOutcome {
        let flow = ErrorClassifier::classify(error.kind);

        let actions = match flow {
            RecoveryFlow::Reauthorize => vec![
                RecoveryAction::UnlinkCredentials,
                RecoveryAction::TriggerSync(SaveMode::Normal),
            ],
            RecoveryFlow::ResolveLimit => match self.ask(PromptKind::ProjectLimit).await {
                Choice::VisitService => vec![
                    RecoveryAction::AwaitExternalAction,
                    RecoveryAction::TriggerSync(SaveMode::Normal),
                ],
                _ => vec![RecoveryAction::ResaveLocally {
                    fallback: SaveMode::Normal,
                }],
            },
            RecoveryFlow::ResolveConflict => match self.ask(PromptKind::VersionConflict).await {
                Choice::UseLocal => vec![RecoveryAction::TriggerSync(SaveMode::ForceSave)],
                _ => vec![RecoveryAction::ReopenProject],
            },
            RecoveryFlow::ResolveMissingProject => {
                match self.ask(PromptKind::NotCloudProject).await {
                    Choice::SaveLocally => vec![RecoveryAction::ResaveLocally {
                        fallback: SaveMode::SaveNew,
                    }],
                    _ => vec![RecoveryAction::TriggerSync(SaveMode::SaveNew)],
                }
            }
            RecoveryFlow::ReportConnection => vec![RecoveryAction::NotifyConnectionIssue],
            RecoveryFlow::ReportFailure => vec![RecoveryAction::ReportFailure {
                message: error.message.clone(),
            }],
            RecoveryFlow::Ignore => Vec::new(),
        };

        RecoveryOutcome {
            kind: error.kind,
            flow,
            actions,
        }
    }

    /// Perform the planned actions in order.
    pub async fn apply(&self, outcome: &RecoveryOutcome) {
        for action in &outcome.actions {
            if let Err(e) = self.perform(action).await {
                let failure = SyncError::Recovery {
                    kind: outcome.kind,
                    message: e.to_string(),
                };
                error!(?action, "{}", failure);
            }
        }
    }

    async fn perform(&self, action: &RecoveryAction) -> crate::Result<()> {
        match action {
            RecoveryAction::UnlinkCredentials => {
                info!("Unlinking cloud credentials");
                self.bridges.credentials.unlink_credentials().await?;
            }
            RecoveryAction::AwaitExternalAction => {
                let context = self
                    .context()
                    .with_message(self.external_action_message.clone());
                self.show(PromptKind::WaitForAction, context).await?;
            }
            RecoveryAction::ResaveLocally { fallback } => {
                let saved = match self.bridges.projects.resave_locally(&self.project).await {
                    Ok(saved) => saved,
                    Err(e) => {
                        warn!("Local resave failed: {}", e);
                        false
                    }
                };
                if !saved {
                    self.trigger(*fallback).await?;
                }
            }
            RecoveryAction::TriggerSync(mode) => self.trigger(*mode).await?,
            RecoveryAction::ReopenProject => {
                info!("Reopening project from the cloud copy");
                self.bridges.projects.reopen_project(&self.project).await?;
            }
            RecoveryAction::NotifyConnectionIssue => {
                self.show(PromptKind::ConnectionIssues, self.context()).await?;
            }
            RecoveryAction::ReportFailure { message } => {
                let context = self
                    .context()
                    .with_title(self.failure_notice_title.clone())
                    .with_message(self.failure_notice_message.clone())
                    .with_details(message.clone());
                self.show(PromptKind::SyncFailed, context).await?;
            }
        }
        Ok(())
    }

    async fn trigger(&self, mode: SaveMode) -> crate::Result<()> {
        info!(%mode, "Triggering cloud sync");
        self.bridges
            .launcher
            .trigger_sync(&self.project, mode)
            .await?;
        Ok(())
    }

    /// Ask a decision prompt. Failures and foreign answers resolve to the
    /// prompt's fallback choice.
    async fn ask(&self, kind: PromptKind) -> Choice {
        match self.bridges.prompts.prompt_choice(kind, self.context()).await {
            Ok(choice) if kind.accepts(choice) => choice,
            Ok(choice) => {
                warn!(?choice, "Unexpected answer to {}", kind);
                kind.fallback_choice()
            }
            Err(e) => {
                warn!("Failed to show {}: {}", kind, e);
                kind.fallback_choice()
            }
        }
    }

    async fn show(&self, kind: PromptKind, context: PromptContext) -> crate::Result<()> {
        let choice = self.bridges.prompts.prompt_choice(kind, context).await?;
        debug!(?choice, "{} acknowledged", kind);
        Ok(())
    }

    fn context(&self) -> PromptContext {
        PromptContext::new(self.project)
    }

    async fn log_diagnostic(&self, error: &CloudSyncError) {
        let message = redact_emails(&error.message);
        error!(
            target: DIAGNOSTIC_TARGET,
            kind = %error.kind,
            project = %self.project,
            "Cloud sync has failed: {}",
            message
        );

        let entry = LogEntry::new(
            LogLevel::Error,
            DIAGNOSTIC_TARGET,
            format!("Cloud sync has failed: {}", message),
        )
        .with_field("kind", error.kind.as_str())
        .with_field("project", self.project.to_string());

        if let Err(e) = self.bridges.logger.log(entry).await {
            warn!("Failed to write sync diagnostic: {}", e);
        }
    }
}
