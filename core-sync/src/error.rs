use bridge_traits::error::BridgeError;
use core_runtime::events::SyncErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Orchestrator already detached")]
    AlreadyDetached,

    #[error("Invalid progress value: {0}")]
    InvalidProgress(f64),

    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),

    #[error("Recovery for {kind} failed: {message}")]
    Recovery { kind: SyncErrorKind, message: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
