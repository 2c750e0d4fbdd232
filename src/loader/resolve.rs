//! Module specifier resolution.
//!
//! Workspace-aliased specifiers (`@ws/pkg/rest`) are rewritten to files in
//! the package's source tree; relative specifiers get index and extension
//! probing. Everything else is left to the host's default resolution.

use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;
use url::Url;

use crate::core::Workspace;
use crate::util::fs::normalize_lexically;

/// Extensions probed, in order, for extension-less paths.
pub const PROBE_EXTENSIONS: &[&str] = &["tsx", "ts"];

/// Core module names that resolve without a `node:` prefix.
const BUILTIN_MODULES: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Whether `specifier` names a runtime builtin (`node:fs`, `fs`, `fs/promises`).
pub fn is_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let head = specifier.split('/').next().unwrap_or(specifier);
    BUILTIN_MODULES.contains(&head)
}

/// Resolution failures.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ResolutionError {
    #[error("cannot find module `{specifier}` imported from {referencing}")]
    #[diagnostic(
        code(moorage::loader::module_not_found),
        help("directories resolve to their index file; paths without an extension are tried with .tsx, then .ts")
    )]
    ModuleNotFound {
        specifier: String,
        /// Path probing started from.
        base: PathBuf,
        /// The importing module, or the packages directory.
        referencing: String,
    },

    #[error("invalid module URL `{url}`")]
    #[diagnostic(code(moorage::loader::invalid_url))]
    InvalidUrl { url: String },

    #[error("failed to inspect {}", path.display())]
    #[diagnostic(code(moorage::loader::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of a resolve request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not ours; hand the specifier to the default resolver unchanged.
    PassThrough(String),
    /// A concrete file.
    Resolved { url: Url, path: PathBuf },
}

impl Resolution {
    /// The string the host should continue resolution with.
    pub fn specifier(&self) -> &str {
        match self {
            Resolution::PassThrough(s) => s,
            Resolution::Resolved { url, .. } => url.as_str(),
        }
    }
}

/// Immutable resolver state; safe to share between threads.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    prefix: String,
    packages_dir: PathBuf,
    node_modules_dir: PathBuf,
    source_dir: String,
}

impl ModuleResolver {
    pub fn new(ws: &Workspace) -> Self {
        ModuleResolver {
            prefix: ws.prefix().to_string(),
            packages_dir: normalize_lexically(&ws.packages_dir()),
            node_modules_dir: normalize_lexically(&ws.node_modules_dir()),
            source_dir: ws.config().source_dir().to_string(),
        }
    }

    /// Resolve `specifier` as imported from `parent`.
    pub fn resolve(&self, specifier: &str, parent: Option<&Url>) -> Result<Resolution, ResolutionError> {
        let alias_root = format!("{}/", self.prefix);
        let is_alias = specifier.starts_with(&alias_root);
        let is_relative = specifier.starts_with("./") || specifier.starts_with("../");

        if is_builtin(specifier) || (!is_alias && !is_relative) {
            return Ok(Resolution::PassThrough(specifier.to_string()));
        }

        let parent_path = match parent {
            Some(url) => Some(url.to_file_path().map_err(|_| ResolutionError::InvalidUrl {
                url: url.to_string(),
            })?),
            None => None,
        };

        if let Some(path) = &parent_path {
            if normalize_lexically(path).starts_with(&self.node_modules_dir) {
                return Ok(Resolution::PassThrough(specifier.to_string()));
            }
        }

        let base = if is_alias {
            self.alias_path(&specifier[alias_root.len()..])
        } else {
            let dir = match &parent_path {
                Some(path) => path.parent().unwrap_or(path).to_path_buf(),
                None => self.packages_dir.clone(),
            };
            normalize_lexically(&dir.join(specifier))
        };

        let referencing = match &parent_path {
            Some(path) => path.display().to_string(),
            None => self.packages_dir.display().to_string(),
        };

        match find_file(&base)? {
            Some(path) => {
                let url = Url::from_file_path(&path).map_err(|_| ResolutionError::InvalidUrl {
                    url: path.display().to_string(),
                })?;
                Ok(Resolution::Resolved { url, path })
            }
            None => Err(ResolutionError::ModuleNotFound {
                specifier: specifier.to_string(),
                base,
                referencing,
            }),
        }
    }

    /// `pkg/rest/of/path` → `{packages}/pkg/{source_dir}/rest/of/path`.
    fn alias_path(&self, rest: &str) -> PathBuf {
        let mut parts = rest.split('/').filter(|p| !p.is_empty());
        let mut path = self.packages_dir.clone();
        if let Some(package) = parts.next() {
            path.push(package);
            path.push(&self.source_dir);
        }
        for part in parts {
            path.push(part);
        }
        normalize_lexically(&path)
    }
}

fn stat(path: &Path) -> Result<Option<std::fs::Metadata>, ResolutionError> {
    crate::util::fs::metadata_if_exists(path).map_err(|source| ResolutionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `{path}.tsx`, then `{path}.ts`.
fn probe_extensions(path: &Path) -> Result<Option<PathBuf>, ResolutionError> {
    for ext in PROBE_EXTENSIONS {
        let mut candidate = path.as_os_str().to_os_string();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if stat(&candidate)?.is_some_and(|m| m.is_file()) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Locate the file `base` refers to.
///
/// A directory resolves to its `index` file; an existing file with an
/// extension resolves to itself; anything else is probed with
/// [`PROBE_EXTENSIONS`].
pub fn find_file(base: &Path) -> Result<Option<PathBuf>, ResolutionError> {
    match stat(base)? {
        Some(meta) if meta.is_dir() => probe_extensions(&base.join("index")),
        Some(meta) if meta.is_file() && base.extension().is_some() => Ok(Some(base.to_path_buf())),
        _ => probe_extensions(base),
    }
}
