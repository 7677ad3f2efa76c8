//! # Orchestrator Configuration
//!
//! Tunables and user-facing strings for the cloud sync orchestrator.
//!
//! ## Overview
//!
//! The configuration uses a builder pattern to construct an
//! [`OrchestratorConfig`]. Every field has a default, and `build()` validates
//! the result fail-fast so a misconfigured orchestrator is rejected before it
//! subscribes to any status stream.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::OrchestratorConfig;
//! use std::time::Duration;
//!
//! let config = OrchestratorConfig::builder()
//!     .close_poll_interval(Duration::from_millis(20))
//!     .wait_dialog_title("Cloud save")
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.progress_resolution, 10_000);
//! ```
//!
//! ## Error Handling
//!
//! Invalid values produce [`Error::Config`] with an actionable message:
//!
//! ```
//! use core_runtime::config::OrchestratorConfig;
//!
//! let result = OrchestratorConfig::builder().progress_resolution(0).build();
//! assert!(result.is_err());
//! ```

use crate::error::{Error, Result};
use crate::events::{StatusBus, DEFAULT_STATUS_BUFFER_SIZE};
use std::time::Duration;

/// Number of ticks a full progress bar is divided into.
pub const DEFAULT_PROGRESS_RESOLUTION: u64 = 10_000;

/// Upper bound for [`OrchestratorConfig::progress_resolution`].
pub const MAX_PROGRESS_RESOLUTION: u64 = 1_000_000;

/// How long the closing gate waits for a status change before polling the
/// indicator again.
pub const DEFAULT_CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound for [`OrchestratorConfig::close_poll_interval`].
pub const MAX_CLOSE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Capacity of the failure queue feeding the recovery task.
pub const DEFAULT_RECOVERY_QUEUE_SIZE: usize = 16;

/// Per-listener buffer of the orchestrator's follow-up event channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 32;

const DEFAULT_DIALOG_TITLE: &str = "Save to cloud";
const DEFAULT_WAIT_MESSAGE: &str =
    "Project is syncing with the cloud. Do you want to stop the sync process?";
const DEFAULT_FAILURE_MESSAGE: &str = "Failed to save the project to the cloud";
const DEFAULT_EXTERNAL_ACTION_MESSAGE: &str = "Please, complete your action on the cloud service";

/// Orchestrator configuration.
///
/// Use [`OrchestratorConfig::builder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Ticks per full progress bar
    pub progress_resolution: u64,

    /// Closing gate wake-up interval
    pub close_poll_interval: Duration,

    /// Per-subscriber buffer of the status bus
    pub status_buffer_size: usize,

    /// Capacity of the failure queue
    pub recovery_queue_size: usize,

    /// Per-listener buffer of the orchestrator event channel
    pub event_buffer_size: usize,

    /// Title of the "still syncing" indicator shown while closing
    pub wait_dialog_title: String,

    /// Message of the "still syncing" indicator shown while closing
    pub wait_dialog_message: String,

    /// Title of the generic failure notice
    pub failure_notice_title: String,

    /// User-facing message of the generic failure notice
    pub failure_notice_message: String,

    /// Message of the blocking "complete your action online" prompt
    pub external_action_message: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            progress_resolution: DEFAULT_PROGRESS_RESOLUTION,
            close_poll_interval: DEFAULT_CLOSE_POLL_INTERVAL,
            status_buffer_size: DEFAULT_STATUS_BUFFER_SIZE,
            recovery_queue_size: DEFAULT_RECOVERY_QUEUE_SIZE,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            wait_dialog_title: DEFAULT_DIALOG_TITLE.to_string(),
            wait_dialog_message: DEFAULT_WAIT_MESSAGE.to_string(),
            failure_notice_title: DEFAULT_DIALOG_TITLE.to_string(),
            failure_notice_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            external_action_message: DEFAULT_EXTERNAL_ACTION_MESSAGE.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new builder seeded with the defaults.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// A status bus sized by [`status_buffer_size`](Self::status_buffer_size).
    pub fn status_bus(&self) -> StatusBus {
        StatusBus::new(self.status_buffer_size)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.progress_resolution == 0 {
            return Err(Error::Config(
                "Progress resolution must be greater than 0".to_string(),
            ));
        }

        if self.progress_resolution > MAX_PROGRESS_RESOLUTION {
            return Err(Error::Config(format!(
                "Progress resolution exceeds maximum of {}",
                MAX_PROGRESS_RESOLUTION
            )));
        }

        if self.close_poll_interval.is_zero() {
            return Err(Error::Config(
                "Close poll interval must be greater than 0ms".to_string(),
            ));
        }

        if self.close_poll_interval > MAX_CLOSE_POLL_INTERVAL {
            return Err(Error::Config(
                "Close poll interval exceeds maximum of 10 seconds".to_string(),
            ));
        }

        if self.status_buffer_size == 0 {
            return Err(Error::Config(
                "Status buffer size must be greater than 0".to_string(),
            ));
        }

        if self.recovery_queue_size == 0 {
            return Err(Error::Config(
                "Recovery queue size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("wait_dialog_title", &self.wait_dialog_title),
            ("wait_dialog_message", &self.wait_dialog_message),
            ("failure_notice_title", &self.failure_notice_title),
            ("failure_notice_message", &self.failure_notice_message),
            ("external_action_message", &self.external_action_message),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", name)));
            }
        }

        Ok(())
    }
}

/// Builder for [`OrchestratorConfig`].
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// Sets the number of ticks per full progress bar.
    ///
    /// Default: 10 000
    pub fn progress_resolution(mut self, resolution: u64) -> Self {
        self.config.progress_resolution = resolution;
        self
    }

    /// Sets how often the closing gate polls the indicator without a status change.
    ///
    /// Default: 50 ms
    pub fn close_poll_interval(mut self, interval: Duration) -> Self {
        self.config.close_poll_interval = interval;
        self
    }

    pub fn status_buffer_size(mut self, size: usize) -> Self {
        self.config.status_buffer_size = size;
        self
    }

    pub fn recovery_queue_size(mut self, size: usize) -> Self {
        self.config.recovery_queue_size = size;
        self
    }

    /// Sets how many follow-up events a slow listener may fall behind.
    ///
    /// Default: 32
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn wait_dialog_title(mut self, title: impl Into<String>) -> Self {
        self.config.wait_dialog_title = title.into();
        self
    }

    pub fn wait_dialog_message(mut self, message: impl Into<String>) -> Self {
        self.config.wait_dialog_message = message.into();
        self
    }

    pub fn failure_notice_title(mut self, title: impl Into<String>) -> Self {
        self.config.failure_notice_title = title.into();
        self
    }

    pub fn failure_notice_message(mut self, message: impl Into<String>) -> Self {
        self.config.failure_notice_message = message.into();
        self
    }

    pub fn external_action_message(mut self, message: impl Into<String>) -> Self {
        self.config.external_action_message = message.into();
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any value is out of range or a message is empty.
    pub fn build(self) -> Result<OrchestratorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
