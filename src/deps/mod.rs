//! Static dependency discovery.
//!
//! - `walker`: deterministic source tree traversal
//! - `extract`: module specifiers from TypeScript/TSX syntax trees
//! - `graph`: classification, per-package dependency sets, workspace graph

pub mod extract;
pub mod graph;
pub mod walker;

pub use extract::{ReferenceMention, SpecifierExtractor};
pub use graph::{classify, compute_deps, is_relative_path, SpecifierKind, WorkspaceGraph};
pub use walker::{walk, ScanError, WalkEntry, WalkOptions};
