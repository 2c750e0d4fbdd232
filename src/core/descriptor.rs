//! Project descriptor (`tsconfig.package.json`) parsing and editing.
//!
//! The descriptor is read through a strict typed view ([`ProjectDescriptor`])
//! while writes go through the raw JSON document so that every key other
//! than `references` keeps its value and position. Descriptors are read
//! as JSONC: comments and trailing commas are accepted, and a rewrite
//! emits plain JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use json_comments::CommentSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors reading or writing a project descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("project descriptor not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read project descriptor {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project descriptor {}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unterminated comment in project descriptor {}", path.display())]
    Comment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project descriptor {} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },
}

/// One entry of the `references` list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectReference {
    pub path: String,
}

/// A runnable script declared by a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Typed view of the fields this tool reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectDescriptor {
    #[serde(default)]
    pub references: Vec<ProjectReference>,

    #[serde(default)]
    pub scripts: BTreeMap<String, ScriptSpec>,
}

impl ProjectDescriptor {
    /// Reference paths, sorted.
    pub fn sorted_reference_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.references.iter().map(|r| r.path.clone()).collect();
        paths.sort();
        paths
    }
}

/// A descriptor file loaded for editing.
#[derive(Debug, Clone)]
pub struct DescriptorDocument {
    path: PathBuf,
    doc: Map<String, Value>,
    descriptor: ProjectDescriptor,
}

impl DescriptorDocument {
    /// Load and validate a descriptor.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DescriptorError::Missing {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(DescriptorError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(path, &content)
    }

    /// Parse descriptor text that was read from `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, DescriptorError> {
        let invalid = |source| DescriptorError::Invalid {
            path: path.to_path_buf(),
            source,
        };

        let mut text = content.to_string();
        json_comments::strip_comments_in_place(&mut text, CommentSettings::c_style(), true)
            .map_err(|source| DescriptorError::Comment {
                path: path.to_path_buf(),
                source,
            })?;

        let value: Value = serde_json::from_str(&text).map_err(invalid)?;
        let doc = match value {
            Value::Object(map) => map,
            _ => {
                return Err(DescriptorError::NotAnObject {
                    path: path.to_path_buf(),
                })
            }
        };
        let descriptor: ProjectDescriptor =
            serde_json::from_value(Value::Object(doc.clone())).map_err(invalid)?;

        Ok(DescriptorDocument {
            path: path.to_path_buf(),
            doc,
            descriptor,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the descriptor.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    /// Replace the reference list in place. Returns `true` when the sorted
    /// content differs from what was stored.
    pub fn set_references(&mut self, mut paths: Vec<String>) -> bool {
        paths.sort();
        paths.dedup();
        if paths == self.descriptor.sorted_reference_paths() {
            return false;
        }

        let references: Vec<ProjectReference> = paths
            .into_iter()
            .map(|path| ProjectReference { path })
            .collect();
        let value = references
            .iter()
            .map(|r| serde_json::json!({ "path": r.path }))
            .collect::<Vec<_>>();

        // Existing key keeps its position under preserve_order
        self.doc.insert("references".to_string(), Value::Array(value));
        self.descriptor.references = references;
        true
    }

    /// Serialize the document.
    pub fn to_json_string(&self) -> String {
        let mut out = serde_json::to_string_pretty(&self.doc).unwrap_or_else(|_| "{}".to_string());
        out.push('\n');
        out
    }

    /// Write the document back with a single write call.
    pub fn save(&self) -> anyhow::Result<()> {
        crate::util::fs::write_string(&self.path, &self.to_json_string())
    }
}
