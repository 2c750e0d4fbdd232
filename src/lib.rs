//! Moorage - build and runtime backbone for multi-package TypeScript workspaces
//!
//! This crate provides the library behind the `moorage` binary: static
//! discovery of inter-package dependencies, project reference
//! synchronization, compiler invocation, the watch-rebuild-restart
//! supervisor, and the runtime module resolver.

pub mod builder;
pub mod core;
pub mod deps;
pub mod loader;
pub mod ops;
pub mod util;

/// Test utilities and mocks for Moorage unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides temporary workspaces and recording
/// implementations of the compiler and process launcher.
#[cfg(test)]
pub mod test_support;

pub use core::{Package, Workspace};
pub use deps::WorkspaceGraph;
pub use util::context::GlobalContext;
