//! Project Persistence and Sync Initiation
//!
//! The orchestrator never saves or uploads anything itself. Local resaves,
//! reopening from the remote copy and starting a new cloud sync all go through
//! the traits below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{BridgeError, Result};

/// Identifier of a project managed by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Create a new random project ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a project ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid project ID: {}", e)))
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ProjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// How a (re)triggered cloud sync treats the remote copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Regular incremental save
    Normal,
    /// Overwrite the remote version with the local one
    ForceSave,
    /// Create a brand new remote project
    SaveNew,
}

impl SaveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveMode::Normal => "normal",
            SaveMode::ForceSave => "force_save",
            SaveMode::SaveNew => "save_new",
        }
    }
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaveMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(SaveMode::Normal),
            "force_save" => Ok(SaveMode::ForceSave),
            "save_new" => Ok(SaveMode::SaveNew),
            other => Err(BridgeError::OperationFailed(format!(
                "Unknown save mode: {}",
                other
            ))),
        }
    }
}

/// Local project persistence
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Save the project to local storage only.
    ///
    /// Returns `Ok(false)` when the user aborted or the save did not complete.
    async fn resave_locally(&self, project: &ProjectId) -> Result<bool>;

    /// Discard the local state and reopen the project from its remote copy.
    async fn reopen_project(&self, project: &ProjectId) -> Result<()>;

    /// Number of times this project has been saved to the cloud before.
    async fn saves_count(&self, project: &ProjectId) -> Result<u64>;
}

/// Entry point for starting a cloud sync.
///
/// The same capability is used by regular saves, so implementations must be
/// safe to call while no other sync for the project is running.
#[async_trait]
pub trait SyncLauncher: Send + Sync {
    async fn trigger_sync(&self, project: &ProjectId, mode: SaveMode) -> Result<()>;
}
