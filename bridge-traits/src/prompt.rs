//! User Prompts
//!
//! Recovery flows and notices block on a user decision. The host decides how a
//! prompt looks; the core only cares which [`Choice`] came back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::project::ProjectId;

/// The dialogs and notices the sync core can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Project count or storage quota exhausted on the service
    ProjectLimit,
    /// Remote copy changed since the last sync
    VersionConflict,
    /// The remote project no longer exists
    NotCloudProject,
    /// Blocks until the user finished an action on the service website
    WaitForAction,
    /// Connectivity failure notice
    ConnectionIssues,
    /// Generic failure notice with a diagnostic attachment
    SyncFailed,
    /// First successful sync notice
    SyncSuccess,
}

/// Identifiers a prompt can return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    VisitService,
    Cancel,
    UseLocal,
    UseRemote,
    SaveLocally,
    SaveRemotely,
    Ok,
    ViewOnline,
    Dismiss,
}

impl PromptKind {
    /// The closed set of identifiers this prompt may return.
    pub fn choices(&self) -> &'static [Choice] {
        match self {
            PromptKind::ProjectLimit => &[Choice::VisitService, Choice::Cancel],
            PromptKind::VersionConflict => &[Choice::UseLocal, Choice::UseRemote],
            PromptKind::NotCloudProject => &[Choice::SaveLocally, Choice::SaveRemotely],
            PromptKind::WaitForAction | PromptKind::ConnectionIssues | PromptKind::SyncFailed => {
                &[Choice::Ok]
            }
            PromptKind::SyncSuccess => &[Choice::ViewOnline, Choice::Dismiss],
        }
    }

    /// Choice assumed when the prompt fails or answers outside [`choices`](Self::choices).
    pub fn fallback_choice(&self) -> Choice {
        match self {
            PromptKind::ProjectLimit => Choice::Cancel,
            PromptKind::VersionConflict => Choice::UseRemote,
            PromptKind::NotCloudProject => Choice::SaveRemotely,
            PromptKind::WaitForAction | PromptKind::ConnectionIssues | PromptKind::SyncFailed => {
                Choice::Ok
            }
            PromptKind::SyncSuccess => Choice::Dismiss,
        }
    }

    /// Whether `choice` belongs to this prompt.
    pub fn accepts(&self, choice: Choice) -> bool {
        self.choices().contains(&choice)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::ProjectLimit => "project_limit",
            PromptKind::VersionConflict => "version_conflict",
            PromptKind::NotCloudProject => "not_cloud_project",
            PromptKind::WaitForAction => "wait_for_action",
            PromptKind::ConnectionIssues => "connection_issues",
            PromptKind::SyncFailed => "sync_failed",
            PromptKind::SyncSuccess => "sync_success",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data a prompt may render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContext {
    /// Project the prompt is about
    pub project: ProjectId,
    /// Optional title override
    pub title: Option<String>,
    /// Optional user-facing message
    pub message: Option<String>,
    /// Diagnostic text attached to the prompt (not user-facing)
    pub details: Option<String>,
}

impl PromptContext {
    pub fn new(project: ProjectId) -> Self {
        Self {
            project,
            title: None,
            message: None,
            details: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Blocking user prompts
///
/// The returned future resolves once the user made a choice. Implementations
/// must not hold the thread that delivers sync status events while waiting.
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn prompt_choice(&self, kind: PromptKind, context: PromptContext) -> Result<Choice>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_part_of_choices() {
        for kind in [
            PromptKind::ProjectLimit,
            PromptKind::VersionConflict,
            PromptKind::NotCloudProject,
            PromptKind::WaitForAction,
            PromptKind::ConnectionIssues,
            PromptKind::SyncFailed,
            PromptKind::SyncSuccess,
        ] {
            assert!(kind.accepts(kind.fallback_choice()), "{}", kind);
        }
    }

    #[test]
    fn test_accepts_rejects_foreign_choice() {
        assert!(!PromptKind::VersionConflict.accepts(Choice::SaveLocally));
        assert!(PromptKind::NotCloudProject.accepts(Choice::SaveLocally));
    }

    #[test]
    fn test_context_builder() {
        let project = ProjectId::new();
        let context = PromptContext::new(project)
            .with_title("Save to cloud")
            .with_message("Failed")
            .with_details("HTTP 500");

        assert_eq!(context.project, project);
        assert_eq!(context.title.as_deref(), Some("Save to cloud"));
        assert_eq!(context.message.as_deref(), Some("Failed"));
        assert_eq!(context.details.as_deref(), Some("HTTP 500"));
    }
}
