//! # First Sync Announcer
//!
//! Decides whether the "your project is now in the cloud" notice is owed and
//! shows it at most once per orchestrator.
//!
//! The save counter is read the first time a status is observed. The notice is
//! owed only if the counter was exactly zero, and fires on the first transition
//! from syncing to a successful sync.
//!
//! Only `Succeeded` counts. A sync that ends `Failed` or drops back to `Idle`
//! leaves the notice owed for a later successful sync.

use bridge_traits::{Choice, ProjectId, ProjectStore, PromptContext, PromptKind, PromptService};
use core_runtime::events::{SyncState, SyncStatus};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of showing the success notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnnouncementOutcome {
    pub choice: Choice,
}

impl AnnouncementOutcome {
    /// Whether the user asked to view the project online. Nothing acts on it.
    pub fn viewed_online(&self) -> bool {
        self.choice == Choice::ViewOnline
    }
}

pub struct FirstSyncAnnouncer {
    project: ProjectId,
    projects: Arc<dyn ProjectStore>,
    owed: Option<bool>,
}

impl FirstSyncAnnouncer {
    pub fn new(project: ProjectId, projects: Arc<dyn ProjectStore>) -> Self {
        Self {
            project,
            projects,
            owed: None,
        }
    }

    /// `None` until the save counter has been read.
    pub fn is_owed(&self) -> Option<bool> {
        self.owed
    }

    /// Feed one processed status. Returns `true` when the notice must be
    /// shown now; the owed flag is already cleared at that point.
    pub async fn on_status(&mut self, was_syncing: bool, status: &SyncStatus) -> bool {
        let owed = match self.owed {
            Some(owed) => owed,
            None => {
                let owed = self.read_owed().await;
                self.owed = Some(owed);
                owed
            }
        };

        if owed && was_syncing && status.state == SyncState::Succeeded {
            self.owed = Some(false);
            return true;
        }
        false
    }

    async fn read_owed(&self) -> bool {
        match self.projects.saves_count(&self.project).await {
            Ok(count) => {
                debug!(project = %self.project, count, "Read cloud save counter");
                count == 0
            }
            Err(e) => {
                warn!(project = %self.project, "Failed to read save counter: {}", e);
                false
            }
        }
    }
}

/// Show the success notice and report what the user picked.
pub async fn announce(prompts: &dyn PromptService, project: ProjectId) -> AnnouncementOutcome {
    let kind = PromptKind::SyncSuccess;
    let choice = match prompts.prompt_choice(kind, PromptContext::new(project)).await {
        Ok(choice) if kind.accepts(choice) => choice,
        Ok(choice) => {
            warn!(?choice, "Unexpected answer to {}", kind);
            kind.fallback_choice()
        }
        Err(e) => {
            warn!("Failed to show {}: {}", kind, e);
            kind.fallback_choice()
        }
    };

    debug!(project = %project, ?choice, "First sync announced");
    AnnouncementOutcome { choice }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result};
    use core_runtime::events::{CloudSyncError, SyncErrorKind};
    use mockall::mock;

    mock! {
        Store {}

        #[async_trait]
        impl ProjectStore for Store {
            async fn resave_locally(&self, project: &ProjectId) -> Result<bool>;
            async fn reopen_project(&self, project: &ProjectId) -> Result<()>;
            async fn saves_count(&self, project: &ProjectId) -> Result<u64>;
        }
    }

    mock! {
        Prompts {}

        #[async_trait]
        impl PromptService for Prompts {
            async fn prompt_choice(&self, kind: PromptKind, context: PromptContext) -> Result<Choice>;
        }
    }

    fn store_with_count(count: u64) -> Arc<MockStore> {
        let mut store = MockStore::new();
        store
            .expect_saves_count()
            .times(1)
            .returning(move |_| Ok(count));
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_fires_once_after_first_success() {
        let mut announcer = FirstSyncAnnouncer::new(ProjectId::new(), store_with_count(0));

        assert!(!announcer.on_status(false, &SyncStatus::idle()).await);
        assert_eq!(announcer.is_owed(), Some(true));
        assert!(!announcer.on_status(false, &SyncStatus::syncing(0.5)).await);
        assert!(announcer.on_status(true, &SyncStatus::succeeded()).await);

        // Later runs never fire again.
        assert!(!announcer.on_status(false, &SyncStatus::syncing(0.1)).await);
        assert!(!announcer.on_status(true, &SyncStatus::succeeded()).await);
    }

    #[tokio::test]
    async fn test_not_owed_for_saved_project() {
        let mut announcer = FirstSyncAnnouncer::new(ProjectId::new(), store_with_count(3));

        assert!(!announcer.on_status(true, &SyncStatus::succeeded()).await);
        assert_eq!(announcer.is_owed(), Some(false));
    }

    #[tokio::test]
    async fn test_failure_keeps_announcement_owed() {
        let mut announcer = FirstSyncAnnouncer::new(ProjectId::new(), store_with_count(0));
        let failed = SyncStatus::failed(CloudSyncError::new(SyncErrorKind::Network, "offline"));

        assert!(!announcer.on_status(true, &failed).await);
        assert!(!announcer.on_status(true, &SyncStatus::idle()).await);
        assert_eq!(announcer.is_owed(), Some(true));
        assert!(announcer.on_status(true, &SyncStatus::succeeded()).await);
    }

    #[tokio::test]
    async fn test_counter_error_means_not_owed() {
        let mut store = MockStore::new();
        store
            .expect_saves_count()
            .times(1)
            .returning(|_| Err(BridgeError::NotAvailable("counter".to_string())));
        let mut announcer = FirstSyncAnnouncer::new(ProjectId::new(), Arc::new(store));

        assert!(!announcer.on_status(true, &SyncStatus::succeeded()).await);
        assert!(!announcer.on_status(true, &SyncStatus::succeeded()).await);
    }

    #[tokio::test]
    async fn test_announce_reports_choice() {
        let mut prompts = MockPrompts::new();
        prompts
            .expect_prompt_choice()
            .withf(|kind, _| *kind == PromptKind::SyncSuccess)
            .times(1)
            .returning(|_, _| Ok(Choice::ViewOnline));

        let outcome = announce(&prompts, ProjectId::new()).await;
        assert!(outcome.viewed_online());
    }

    #[tokio::test]
    async fn test_announce_falls_back_to_dismiss() {
        let mut prompts = MockPrompts::new();
        prompts
            .expect_prompt_choice()
            .times(1)
            .returning(|_, _| Ok(Choice::UseLocal));

        let outcome = announce(&prompts, ProjectId::new()).await;
        assert_eq!(outcome.choice, Choice::Dismiss);
    }
}
