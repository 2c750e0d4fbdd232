//! Source tree traversal.
//!
//! [`walk`] turns a directory into a finite, sorted sequence of
//! [`WalkEntry`] values. What happens to each entry (and how concurrently)
//! is left to the caller.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Fatal error while scanning a directory tree.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to scan {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },
}

impl From<walkdir::Error> for ScanError {
    fn from(err: walkdir::Error) -> Self {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        match err.into_io_error() {
            Some(source) => ScanError::Io { path, source },
            // Symlink loops carry no io::Error
            None => ScanError::Walk {
                path,
                message: "filesystem loop detected".to_string(),
            },
        }
    }
}

/// Traversal settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Extensions (without dot) of files to yield; empty means all files.
    pub allowed_extensions: Vec<String>,

    /// Any path containing one of these substrings is skipped and not
    /// descended into.
    pub excluded: Vec<String>,
}

impl WalkOptions {
    pub fn new(allowed_extensions: Vec<String>, excluded: Vec<String>) -> Self {
        WalkOptions {
            allowed_extensions,
            excluded,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.excluded
            .iter()
            .any(|needle| !needle.is_empty() && text.contains(needle.as_str()))
    }

    fn is_allowed(&self, path: &Path) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy())
            .unwrap_or_default();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.') == ext)
    }
}

/// A source file read during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub contents: String,
}

impl SourceFile {
    /// File extension without the dot, or an empty string.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}

/// One item produced by a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    /// A subdirectory, yielded before anything inside it.
    Directory(PathBuf),
    /// An allowed file with its decoded text.
    File(SourceFile),
}

/// Walk `root` recursively.
///
/// The root itself is not yielded. Siblings come in file-name order. Any I/O
/// error, including a broken or looping symlink, is yielded as `Err` and
/// should abort the scan.
pub fn walk(root: &Path, opts: &WalkOptions) -> impl Iterator<Item = Result<WalkEntry, ScanError>> {
    let opts = opts.clone();
    let filter_opts = opts.clone();

    WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !filter_opts.is_excluded(entry.path()))
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(ScanError::from(e))),
            };

            if entry.file_type().is_dir() {
                return Some(Ok(WalkEntry::Directory(entry.into_path())));
            }

            if !entry.file_type().is_file() || !opts.is_allowed(entry.path()) {
                return None;
            }

            let path = entry.into_path();
            Some(match std::fs::read(&path) {
                Ok(bytes) => Ok(WalkEntry::File(SourceFile {
                    contents: String::from_utf8_lossy(&bytes).into_owned(),
                    path,
                })),
                Err(source) => Err(ScanError::Io { path, source }),
            })
        })
}

/// Collect every allowed file under `root`, failing on the first scan error.
pub fn collect_files(root: &Path, opts: &WalkOptions) -> Result<Vec<SourceFile>, ScanError> {
    let mut files = Vec::new();
    for entry in walk(root, opts) {
        if let WalkEntry::File(file) = entry? {
            files.push(file);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) {
        std::fs::create_dir_all(root.join("lib/nested")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        std::fs::write(root.join("main.ts"), "import '@ws/a';").unwrap();
        std::fs::write(root.join("view.tsx"), "export {}").unwrap();
        std::fs::write(root.join("notes.md"), "# notes").unwrap();
        std::fs::write(root.join("lib/nested/deep.ts"), "export {}").unwrap();
        std::fs::write(root.join("node_modules/dep/index.ts"), "export {}").unwrap();
    }

    fn names(files: &[SourceFile], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_allowed_extensions_and_exclusions() {
        let tmp = TempDir::new().unwrap();
        sample_tree(tmp.path());

        let opts = WalkOptions::new(
            vec!["ts".to_string(), "tsx".to_string()],
            vec!["node_modules".to_string()],
        );
        let files = collect_files(tmp.path(), &opts).unwrap();
        assert_eq!(
            names(&files, tmp.path()),
            vec!["lib/nested/deep.ts", "main.ts", "view.tsx"]
        );
        assert_eq!(files[1].contents, "import '@ws/a';");
        assert_eq!(files[2].extension(), "tsx");
    }

    #[test]
    fn test_empty_allow_list_yields_all_files() {
        let tmp = TempDir::new().unwrap();
        sample_tree(tmp.path());

        let files = collect_files(tmp.path(), &WalkOptions::default()).unwrap();
        assert_eq!(files.len(), 5);
    }

    #[test]
    fn test_directories_precede_their_contents() {
        let tmp = TempDir::new().unwrap();
        sample_tree(tmp.path());

        let entries: Vec<WalkEntry> = walk(tmp.path(), &WalkOptions::default())
            .collect::<Result<_, _>>()
            .unwrap();
        let lib_pos = entries
            .iter()
            .position(|e| matches!(e, WalkEntry::Directory(p) if p.ends_with("lib")))
            .unwrap();
        let deep_pos = entries
            .iter()
            .position(|e| matches!(e, WalkEntry::File(f) if f.path.ends_with("deep.ts")))
            .unwrap();
        assert!(lib_pos < deep_pos);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let result = collect_files(&tmp.path().join("missing"), &WalkOptions::default());
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_fatal() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(tmp.path().join("nowhere"), tmp.path().join("dangling.ts"))
            .unwrap();

        let result = collect_files(tmp.path(), &WalkOptions::default());
        assert!(result.is_err());
    }
}
