//! Workspace placeholder crate.
//!
//! Re-exports the workspace crates so host applications can depend on
//! `cloudsync-workspace` alone and reach the orchestrator, its runtime
//! infrastructure and the bridge contracts they have to implement.

pub use bridge_traits;
pub use core_runtime;
pub use core_sync;
