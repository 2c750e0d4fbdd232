//! Module loading with redirection to compiled artifacts.
//!
//! Sources that need a transform before execution (`.tsx`) are never read
//! raw: their compiled counterpart is served from the artifact cache. Other
//! files are left to the host's default loader.

use std::path::{Component, Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;
use url::Url;

use crate::core::Workspace;
use crate::util::fs::normalize_lexically;

/// Load failures.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum LoadError {
    #[error("no compiled artifact for {} (expected {})", source_path.display(), cache_path.display())]
    #[diagnostic(
        code(moorage::loader::missing_artifact),
        help("Run `moorage build <package>` before starting the process")
    )]
    MissingArtifact {
        source_path: PathBuf,
        cache_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not inside the packages directory", path.display())]
    #[diagnostic(code(moorage::loader::outside_workspace))]
    OutsideWorkspace { path: PathBuf },

    #[error("invalid module URL `{url}`")]
    #[diagnostic(code(moorage::loader::invalid_url))]
    InvalidUrl { url: String },
}

/// Outcome of a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    /// Compiled module text read from the cache.
    Module { source: String, cache_path: PathBuf },
    /// Let the default loader handle the URL.
    Default,
}

/// Extensions served from the artifact cache.
pub const REDIRECTED_EXTENSIONS: &[&str] = &["tsx"];

/// Maps source files to their cached compiled output.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    packages_dir: PathBuf,
    cache_dir: PathBuf,
}

impl ModuleLoader {
    pub fn new(ws: &Workspace) -> Self {
        ModuleLoader {
            packages_dir: normalize_lexically(&ws.packages_dir()),
            cache_dir: normalize_lexically(&ws.cache_dir()),
        }
    }

    /// `{packages}/{pkg}/{src}/{rest}.tsx` → `{cache}/{pkg}/{rest}.js`.
    pub fn cache_path(&self, source_path: &Path) -> Result<PathBuf, LoadError> {
        let outside = || LoadError::OutsideWorkspace {
            path: source_path.to_path_buf(),
        };
        let relative = normalize_lexically(source_path)
            .strip_prefix(&self.packages_dir)
            .map_err(|_| outside())?
            .to_path_buf();

        let mut parts = relative.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        });
        let package = parts.next().ok_or_else(outside)?;
        // Source directory level is dropped
        parts.next().ok_or_else(outside)?;

        let mut cache = self.cache_dir.join(package);
        for part in parts {
            cache.push(part);
        }
        cache.set_extension("js");
        Ok(cache)
    }

    /// Load the module at `url`.
    pub fn load(&self, url: &Url) -> Result<LoadResult, LoadError> {
        let path = url.to_file_path().map_err(|_| LoadError::InvalidUrl {
            url: url.to_string(),
        })?;

        let redirected = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| REDIRECTED_EXTENSIONS.contains(&e));
        if !redirected {
            return Ok(LoadResult::Default);
        }

        let cache_path = self.cache_path(&path)?;
        match std::fs::read_to_string(&cache_path) {
            Ok(source) => Ok(LoadResult::Module { source, cache_path }),
            Err(source) => Err(LoadError::MissingArtifact {
                source_path: path,
                cache_path,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WorkspaceFixture;

    fn fixture() -> WorkspaceFixture {
        WorkspaceFixture::new()
            .package("front")
            .file("front", "components/App.tsx", "export const App = () => <div />;")
            .file("front", "main.ts", "import './components/App';")
            .root_file(".cache/front/components/App.js", "export const App = () => h('div');")
    }

    #[test]
    fn test_tsx_served_from_cache() {
        let fx = fixture();
        let ws = fx.workspace();
        let loader = ModuleLoader::new(&ws);
        let url = Url::from_file_path(ws.source_root("front").join("components/App.tsx")).unwrap();

        match loader.load(&url).unwrap() {
            LoadResult::Module { source, cache_path } => {
                assert!(source.contains("h('div')"));
                assert!(cache_path.ends_with(".cache/front/components/App.js"));
            }
            other => panic!("expected module, got {:?}", other),
        }
    }

    #[test]
    fn test_other_extensions_use_default() {
        let fx = fixture();
        let ws = fx.workspace();
        let loader = ModuleLoader::new(&ws);
        let url = Url::from_file_path(ws.source_root("front").join("main.ts")).unwrap();

        assert_eq!(loader.load(&url).unwrap(), LoadResult::Default);
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let fx = fixture().file("front", "Other.tsx", "export {};");
        let ws = fx.workspace();
        let loader = ModuleLoader::new(&ws);
        let url = Url::from_file_path(ws.source_root("front").join("Other.tsx")).unwrap();

        let err = loader.load(&url).unwrap_err();
        assert!(matches!(err, LoadError::MissingArtifact { .. }));
        assert!(err.to_string().contains("Other.js"));
    }

    #[test]
    fn test_tsx_outside_packages() {
        let fx = fixture().root_file("loader/x.tsx", "");
        let loader = ModuleLoader::new(&fx.workspace());
        let url = Url::from_file_path(fx.root().join("loader/x.tsx")).unwrap();

        assert!(matches!(
            loader.load(&url),
            Err(LoadError::OutsideWorkspace { .. })
        ));
    }
}
