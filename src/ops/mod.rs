//! High-level operations.
//!
//! This module contains the implementation of Moorage commands.

pub mod build;
pub mod run_script;
pub mod sync;
pub mod watch;

pub use build::{build, reference_closure, ReferenceClosure};
pub use run_script::{run_script, script_command, DEFAULT_SCRIPT};
pub use sync::{
    check_references, sync_package, sync_package_with, update_references,
    update_references_deep, DeepSyncReport, SyncMode, SyncOutcome, SyncReport,
};
pub use watch::{
    watch, CycleOutcome, Launcher, NodeLauncher, PackageWatcher, Supervisor, WatchEvent,
    WatchEventKind, WatchPhase,
};
