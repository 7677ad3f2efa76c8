//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the cloud-sync core:
//! - Logging and tracing infrastructure
//! - Orchestrator configuration
//! - Sync status model and the status event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the orchestrator depends on. It
//! establishes the logging conventions and the broadcast mechanism through
//! which the background sync process publishes its status.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
