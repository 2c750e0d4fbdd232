//! Temporary workspaces for tests.
//!
//! A [`WorkspaceFixture`] is a real directory tree under a `TempDir`, laid
//! out the way a workspace is on disk: a root `package.json` named `ws`
//! (so the alias prefix is `@ws`) and packages under `packages/`.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::{DescriptorDocument, Workspace};
use crate::util::config::Config;

/// Descriptor written for every package created with
/// [`WorkspaceFixture::package`].
pub fn default_descriptor(name: &str) -> String {
    format!(
        r#"{{
  "extends": "../../tsconfig.base.json",
  "compilerOptions": {{
    "outDir": "../../dist/{name}",
    "rootDir": "src",
    "composite": true
  }},
  "include": ["src"],
  "references": []
}}
"#
    )
}

/// A workspace on disk that is deleted on drop.
pub struct WorkspaceFixture {
    dir: TempDir,
    config: Config,
}

impl WorkspaceFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::write(
            dir.path().join("package.json"),
            r#"{ "name": "ws", "private": true }"#,
        )
        .expect("write package.json");
        std::fs::create_dir_all(dir.path().join("packages")).expect("create packages dir");

        WorkspaceFixture {
            dir,
            config: Config::default(),
        }
    }

    /// Add a package with an empty `src/` and a default descriptor.
    pub fn package(self, name: &str) -> Self {
        let fx = self.package_without_descriptor(name);
        let descriptor = default_descriptor(name);
        fx.descriptor(name, &descriptor)
    }

    /// Add a package with an empty `src/` and no descriptor.
    pub fn package_without_descriptor(self, name: &str) -> Self {
        std::fs::create_dir_all(self.package_dir(name).join("src")).expect("create src dir");
        self
    }

    /// Overwrite a package descriptor with raw text.
    pub fn descriptor(self, package: &str, content: &str) -> Self {
        let path = self.package_dir(package).join("tsconfig.package.json");
        std::fs::write(path, content).expect("write descriptor");
        self
    }

    /// Write a source file under `packages/{package}/src/`.
    pub fn file(self, package: &str, relative: &str, content: &str) -> Self {
        let path = self.package_dir(package).join("src").join(relative);
        self.write(path, content)
    }

    /// Write a file relative to the workspace root.
    pub fn root_file(self, relative: &str, content: &str) -> Self {
        let path = self.dir.path().join(relative);
        self.write(path, content)
    }

    /// Replace the configuration handed to [`WorkspaceFixture::workspace`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    fn write(self, path: PathBuf, content: &str) -> Self {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write file");
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join("packages").join(name)
    }

    /// Load the workspace rooted at the fixture.
    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.dir.path(), self.config.clone()).expect("load workspace")
    }

    pub fn read_descriptor(&self, package: &str) -> String {
        std::fs::read_to_string(self.package_dir(package).join("tsconfig.package.json"))
            .expect("read descriptor")
    }

    /// Stored reference paths of a package, in file order.
    pub fn references(&self, package: &str) -> Vec<String> {
        let path = self.package_dir(package).join("tsconfig.package.json");
        DescriptorDocument::load(&path)
            .expect("load descriptor")
            .descriptor()
            .references
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }
}

impl Default for WorkspaceFixture {
    fn default() -> Self {
        Self::new()
    }
}
