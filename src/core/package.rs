//! Package - one sibling directory of the workspace.

use std::path::{Path, PathBuf};

use crate::core::descriptor::{DescriptorDocument, DescriptorError};
use crate::core::Workspace;

/// A workspace package and its well-known locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    name: String,
    root: PathBuf,
    source_root: PathBuf,
    descriptor_path: PathBuf,
}

impl Package {
    /// Describe the package `name` of `ws`. Existence is not checked.
    pub fn new(ws: &Workspace, name: &str) -> Self {
        Package {
            name: name.to_string(),
            root: ws.package_dir(name),
            source_root: ws.source_root(name),
            descriptor_path: ws.descriptor_path(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the package root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the source directory (typically src/).
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Get the project descriptor path.
    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    /// Load the project descriptor for editing.
    pub fn load_descriptor(&self) -> Result<DescriptorDocument, DescriptorError> {
        DescriptorDocument::load(&self.descriptor_path)
    }
}
