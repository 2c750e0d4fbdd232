//! Build event types for JSON output.
//!
//! This module defines the JSON-lines schema for machine-readable build
//! output, emitted with `--message-format json`.
//!
//! # Event Types
//!
//! - `references-synced`: descriptor references were reconciled
//! - `build-started`: the compiler is about to run for a package
//! - `compiler-diagnostic`: one diagnostic reported by the compiler
//! - `build-finished`: build completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or
//! renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::util::diagnostic::Diagnostic;

/// A build event emitted during the build process.
///
/// Each event is serialized as a single JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// Reference reconciliation finished.
    #[serde(rename = "references-synced")]
    ReferencesSynced {
        /// Packages whose descriptor was rewritten
        updated: Vec<String>,
        /// Packages skipped because of descriptor problems
        skipped: Vec<String>,
    },

    /// The compiler is about to run.
    #[serde(rename = "build-started")]
    BuildStarted {
        package: String,
        descriptor: PathBuf,
        /// Packages in the reference closure
        references: Vec<String>,
    },

    /// A diagnostic reported for the package.
    #[serde(rename = "compiler-diagnostic")]
    CompilerDiagnostic {
        package: String,
        /// Severity level ("error", "warning", "note", "help")
        level: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        package: String,
        /// Whether the build succeeded
        success: bool,
        /// Whether the compiler skipped writing output
        emit_skipped: bool,
        /// Total build duration in milliseconds
        duration_ms: u64,
    },
}

impl BuildEvent {
    /// Create a reference reconciliation event.
    pub fn synced(updated: Vec<String>, skipped: Vec<String>) -> Self {
        BuildEvent::ReferencesSynced { updated, skipped }
    }

    /// Create a build started event.
    pub fn started(package: impl Into<String>, descriptor: PathBuf, references: Vec<String>) -> Self {
        BuildEvent::BuildStarted {
            package: package.into(),
            descriptor,
            references,
        }
    }

    /// Create a diagnostic event.
    pub fn diagnostic(package: impl Into<String>, diagnostic: &Diagnostic) -> Self {
        let location = diagnostic.location.as_ref();
        BuildEvent::CompilerDiagnostic {
            package: package.into(),
            level: diagnostic.severity.to_string(),
            code: diagnostic.code.clone(),
            message: diagnostic.message.clone(),
            file: location.map(|l| l.path.clone()),
            line: location.and_then(|l| l.line),
            column: location.and_then(|l| l.column),
        }
    }

    /// Create a build finished event.
    pub fn finished(package: impl Into<String>, success: bool, emit_skipped: bool, duration_ms: u64) -> Self {
        BuildEvent::BuildFinished {
            package: package.into(),
            success,
            emit_skipped,
            duration_ms,
        }
    }

    /// Serialize this event to a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
