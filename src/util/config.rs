//! Configuration file support for Moorage.
//!
//! Moorage supports two configuration file locations:
//! - Global: `<config dir>/moorage/config.toml` - User-wide defaults
//! - Project: `moorage.toml` at the workspace root - Project-specific overrides
//!
//! Project config takes precedence over global config. Every key is optional;
//! accessors fall back to the layout the workspace tooling has always used
//! (`packages/<name>/src`, `tsconfig.package.json`, `.cache`, `dist`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Project configuration file name.
pub const PROJECT_CONFIG_NAME: &str = "moorage.toml";

/// Moorage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace layout
    pub workspace: WorkspaceConfig,

    /// Source scanning
    pub scan: ScanConfig,

    /// External compiler invocation
    pub compiler: CompilerConfig,

    /// Development process launch
    pub runtime: RuntimeConfig,

    /// Watch loop settings
    pub watch: WatchConfig,
}

/// Workspace layout settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding one subdirectory per package
    pub packages_dir: Option<String>,

    /// Source root inside each package
    pub source_dir: Option<String>,

    /// Project descriptor file name inside each package
    pub descriptor: Option<String>,

    /// Compiled-artifact cache root
    pub cache_dir: Option<String>,

    /// Compiled output root
    pub dist_dir: Option<String>,

    /// Dependency installation tree
    pub node_modules_dir: Option<String>,

    /// Alias prefix (defaults to `@` + the root package.json name)
    pub prefix: Option<String>,
}

/// Source scanning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions (without dot) considered source files
    pub extensions: Option<Vec<String>>,

    /// Path substrings excluded from scans
    pub exclude: Option<Vec<String>>,
}

/// Compiler invocation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Program to run (e.g. `npx`)
    pub program: Option<String>,

    /// Arguments placed before the descriptor path
    pub args: Option<Vec<String>>,
}

/// Development process settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Program to run (e.g. `node`)
    pub program: Option<String>,

    /// Arguments placed before the entry point
    pub args: Option<Vec<String>>,

    /// Entry point file inside `{dist}/{package}`
    pub entry: Option<String>,
}

/// Watch loop settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Path substrings whose events are ignored
    pub ignore: Vec<String>,

    /// How often the loop reaps an exited child, in milliseconds
    pub poll_interval_ms: Option<u64>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let ws = other.workspace;
        merge_opt(&mut self.workspace.packages_dir, ws.packages_dir);
        merge_opt(&mut self.workspace.source_dir, ws.source_dir);
        merge_opt(&mut self.workspace.descriptor, ws.descriptor);
        merge_opt(&mut self.workspace.cache_dir, ws.cache_dir);
        merge_opt(&mut self.workspace.dist_dir, ws.dist_dir);
        merge_opt(&mut self.workspace.node_modules_dir, ws.node_modules_dir);
        merge_opt(&mut self.workspace.prefix, ws.prefix);

        merge_opt(&mut self.scan.extensions, other.scan.extensions);
        merge_opt(&mut self.scan.exclude, other.scan.exclude);

        merge_opt(&mut self.compiler.program, other.compiler.program);
        merge_opt(&mut self.compiler.args, other.compiler.args);

        merge_opt(&mut self.runtime.program, other.runtime.program);
        merge_opt(&mut self.runtime.args, other.runtime.args);
        merge_opt(&mut self.runtime.entry, other.runtime.entry);

        // Ignore lists accumulate across layers
        self.watch.ignore.extend(other.watch.ignore);
        merge_opt(&mut self.watch.poll_interval_ms, other.watch.poll_interval_ms);
    }

    pub fn packages_dir(&self) -> &str {
        self.workspace.packages_dir.as_deref().unwrap_or("packages")
    }

    pub fn source_dir(&self) -> &str {
        self.workspace.source_dir.as_deref().unwrap_or("src")
    }

    pub fn descriptor_name(&self) -> &str {
        self.workspace
            .descriptor
            .as_deref()
            .unwrap_or("tsconfig.package.json")
    }

    pub fn cache_dir(&self) -> &str {
        self.workspace.cache_dir.as_deref().unwrap_or(".cache")
    }

    pub fn dist_dir(&self) -> &str {
        self.workspace.dist_dir.as_deref().unwrap_or("dist")
    }

    pub fn node_modules_dir(&self) -> &str {
        self.workspace
            .node_modules_dir
            .as_deref()
            .unwrap_or("node_modules")
    }

    /// Source extensions, without the leading dot.
    pub fn source_extensions(&self) -> Vec<String> {
        self.scan
            .extensions
            .clone()
            .unwrap_or_else(|| vec!["ts".to_string(), "tsx".to_string()])
    }

    pub fn scan_exclude(&self) -> Vec<String> {
        self.scan
            .exclude
            .clone()
            .unwrap_or_else(|| vec!["node_modules".to_string()])
    }

    pub fn compiler_program(&self) -> &str {
        self.compiler.program.as_deref().unwrap_or("npx")
    }

    pub fn compiler_args(&self) -> Vec<String> {
        self.compiler
            .args
            .clone()
            .unwrap_or_else(|| vec!["tsc".to_string(), "-b".to_string()])
    }

    pub fn runtime_program(&self) -> &str {
        self.runtime.program.as_deref().unwrap_or("node")
    }

    pub fn runtime_args(&self) -> Vec<String> {
        self.runtime
            .args
            .clone()
            .unwrap_or_else(|| vec!["--import=./loader/index.mjs".to_string()])
    }

    pub fn runtime_entry(&self) -> &str {
        self.runtime.entry.as_deref().unwrap_or("main.js")
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.watch.poll_interval_ms.unwrap_or(250)
    }
}

fn merge_opt<T>(slot: &mut Option<T>, other: Option<T>) {
    if other.is_some() {
        *slot = other;
    }
}

/// Get the global moorage config directory.
pub fn global_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "moorage", "moorage")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the global config path.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path for a workspace root.
pub fn project_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(PROJECT_CONFIG_NAME)
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (moorage.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}
