//! Workspace - central configuration hub.
//!
//! A Workspace is the root directory of a multi-package source tree together
//! with its merged configuration. Every component receives one explicitly
//! instead of consulting process-wide paths, so tests can point it at an
//! isolated temporary tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::core::Package;
use crate::deps::walker::ScanError;
use crate::util::config::Config;
use crate::util::fs;

/// Root manifest holding the workspace name.
pub const WORKSPACE_MANIFEST: &str = "package.json";

/// Errors locating or loading a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("could not find a workspace root in {} or any parent directory", dir.display())]
    NotFound { dir: PathBuf },

    #[error("{} has no `name`; it is needed to derive the workspace alias prefix", path.display())]
    MissingName { path: PathBuf },

    #[error("package `{name}` not found in workspace (available: {available})")]
    UnknownPackage { name: String, available: String },
}

#[derive(Debug, Deserialize)]
struct RootManifest {
    name: Option<String>,
}

/// A multi-package workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    name: String,
    prefix: String,
    config: Config,
}

impl Workspace {
    /// Load a workspace from its root directory.
    ///
    /// The alias prefix comes from `workspace.prefix` when configured, else
    /// `@` followed by the `name` in the root `package.json`.
    pub fn new(root: &Path, config: Config) -> Result<Self> {
        let manifest_path = root.join(WORKSPACE_MANIFEST);
        let name = if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)?;
            let manifest: RootManifest = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", manifest_path.display()))?;
            manifest.name
        } else {
            None
        };

        let (name, prefix) = match (name, config.workspace.prefix.clone()) {
            (name, Some(prefix)) => {
                let name = name.unwrap_or_else(|| prefix.trim_start_matches('@').to_string());
                (name, prefix)
            }
            (Some(name), None) => {
                let prefix = format!("@{}", name.trim_start_matches('@'));
                (name, prefix)
            }
            (None, None) => {
                return Err(WorkspaceError::MissingName {
                    path: manifest_path,
                }
                .into())
            }
        };

        Ok(Workspace {
            root: root.to_path_buf(),
            name,
            prefix,
            config,
        })
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Workspace name from the root manifest.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias prefix shared by all sibling packages (e.g. `@ws`).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join(self.config.packages_dir())
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.packages_dir().join(name)
    }

    /// Source root of a package (e.g. `packages/server/src`).
    pub fn source_root(&self, name: &str) -> PathBuf {
        self.package_dir(name).join(self.config.source_dir())
    }

    /// Project descriptor path of a package.
    pub fn descriptor_path(&self, name: &str) -> PathBuf {
        self.package_dir(name).join(self.config.descriptor_name())
    }

    /// Compiled-artifact cache root.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(self.config.cache_dir())
    }

    /// Compiled output root.
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(self.config.dist_dir())
    }

    /// Dependency installation tree.
    pub fn node_modules_dir(&self) -> PathBuf {
        self.root.join(self.config.node_modules_dir())
    }

    /// Compiled entry point of a package.
    pub fn entry_point(&self, name: &str) -> PathBuf {
        self.dist_dir().join(name).join(self.config.runtime_entry())
    }

    /// Names of all current sibling package directories, sorted.
    pub fn package_names(&self) -> Result<Vec<String>, ScanError> {
        let dir = self.packages_dir();
        let entries = std::fs::read_dir(&dir).map_err(|source| ScanError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ScanError::Io {
                path: dir.clone(),
                source,
            })?;
            let is_dir = entry
                .file_type()
                .map_err(|source| ScanError::Io {
                    path: entry.path(),
                    source,
                })?
                .is_dir();
            if is_dir {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Check whether `name` is a current sibling package.
    pub fn contains(&self, name: &str) -> bool {
        !name.is_empty() && self.package_dir(name).is_dir()
    }

    /// Get a package by name, failing with the list of available packages.
    pub fn package(&self, name: &str) -> Result<Package> {
        if !self.contains(name) {
            let available = self.package_names().unwrap_or_default();
            return Err(WorkspaceError::UnknownPackage {
                name: name.to_string(),
                available: if available.is_empty() {
                    "(none)".to_string()
                } else {
                    available.join(", ")
                },
            }
            .into());
        }
        Ok(Package::new(self, name))
    }

    /// The top-level package a path belongs to, if it lies under the
    /// packages directory.
    pub fn package_of_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(self.packages_dir()).ok()?;
        relative
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
    }
}
