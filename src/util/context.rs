//! Global context for Moorage operations.
//!
//! Provides centralized access to the working directory and workspace
//! discovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::workspace::{Workspace, WorkspaceError, WORKSPACE_MANIFEST};
use crate::util::config::{self, load_config, Config, PROJECT_CONFIG_NAME};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,
    /// User-level config file, if any
    global_config: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            global_config: config::global_config_path(),
        }
    }

    /// Use `path` as the user-level config file instead of the default.
    pub fn with_global_config(mut self, path: Option<PathBuf>) -> Self {
        self.global_config = path;
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Find the workspace root starting from cwd and searching upward.
    ///
    /// A directory is a workspace root when it holds `moorage.toml`, or when
    /// it holds `package.json` next to the configured packages directory.
    pub fn find_workspace_root(&self) -> Result<PathBuf, WorkspaceError> {
        let mut current = self.cwd.clone();
        loop {
            if self.is_workspace_root(&current) {
                return Ok(current);
            }
            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }

    /// Load the merged configuration for a workspace root.
    pub fn load_config(&self, root: &Path) -> Config {
        load_config(
            self.global_config.as_deref(),
            &config::project_config_path(root),
        )
    }

    fn is_workspace_root(&self, dir: &Path) -> bool {
        if dir.join(PROJECT_CONFIG_NAME).is_file() {
            return true;
        }
        if !dir.join(WORKSPACE_MANIFEST).is_file() {
            return false;
        }
        let config = self.load_config(dir);
        dir.join(config.packages_dir()).is_dir()
    }

    /// Locate the workspace and load it with its merged configuration.
    pub fn workspace(&self) -> Result<Workspace> {
        let root = self.find_workspace_root()?;
        let config = self.load_config(&root);
        Workspace::new(&root, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_workspace_root_from_nested_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("package.json"), r#"{"name":"ws"}"#).unwrap();
        let nested = tmp.path().join("packages").join("server").join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).with_global_config(None);
        assert_eq!(ctx.find_workspace_root().unwrap(), tmp.path());
    }

    #[test]
    fn test_find_workspace_root_via_config_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("moorage.toml"), "").unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).with_global_config(None);
        assert_eq!(ctx.find_workspace_root().unwrap(), tmp.path());
    }

    #[test]
    fn test_find_workspace_root_missing() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).with_global_config(None);
        assert!(matches!(
            ctx.find_workspace_root(),
            Err(WorkspaceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_find_workspace_root_with_configured_packages_dir() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("ws");
        let nested = root.join("libs").join("server").join("src");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join("package.json"), r#"{"name":"ws"}"#).unwrap();

        let global = tmp.path().join("config.toml");
        std::fs::write(&global, "[workspace]\npackages_dir = \"libs\"\n").unwrap();

        let ctx = GlobalContext::with_cwd(nested.clone()).with_global_config(Some(global));
        assert_eq!(ctx.find_workspace_root().unwrap(), root);

        let ctx = GlobalContext::with_cwd(nested).with_global_config(None);
        assert!(ctx.find_workspace_root().is_err());
    }
}
