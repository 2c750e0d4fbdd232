//! Core data structures for Moorage.
//!
//! This module contains the foundational types used throughout Moorage:
//! - The workspace (root, alias prefix, layout)
//! - Packages and their project descriptors

pub mod descriptor;
pub mod package;
pub mod workspace;

pub use descriptor::{DescriptorDocument, DescriptorError, ProjectDescriptor, ProjectReference, ScriptSpec};
pub use package::Package;
pub use workspace::{Workspace, WorkspaceError, WORKSPACE_MANIFEST};
