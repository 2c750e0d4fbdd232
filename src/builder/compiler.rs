//! External compiler driver.
//!
//! Type checking and emission are delegated to an incremental compiler
//! process (`npx tsc -b` by default). Its textual output is turned into
//! structured [`Diagnostic`]s.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::util::config::Config;
use crate::util::diagnostic::{Diagnostic, Severity};
use crate::util::process::{resolve_program, ProcessBuilder};

/// One compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub package: String,
    /// Descriptor of the package being built.
    pub descriptor: PathBuf,
    /// Descriptors of the reference closure, dependencies first.
    pub references: Vec<PathBuf>,
    /// Directory the compiler runs in.
    pub cwd: PathBuf,
}

/// What the compiler reported.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub diagnostics: Vec<Diagnostic>,
    /// No output was written.
    pub emit_skipped: bool,
}

impl CompileOutput {
    pub fn success() -> Self {
        CompileOutput::default()
    }
}

/// Something that can compile a package.
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput>;
}

/// Build-mode TypeScript compiler run as a child process.
#[derive(Debug, Clone)]
pub struct TscCompiler {
    program: String,
    args: Vec<String>,
}

impl TscCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        TscCompiler {
            program: program.into(),
            args,
        }
    }

    /// Program and leading arguments from `[compiler]`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.compiler_program(), config.compiler_args())
    }

    fn command(&self, request: &CompileRequest) -> ProcessBuilder {
        ProcessBuilder::new(resolve_program(&self.program))
            .args(&self.args)
            .arg(&request.descriptor)
            .cwd(&request.cwd)
    }
}

impl Compiler for TscCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput> {
        let cmd = self.command(request);
        debug!("running {}", cmd.display_command());

        let output = cmd
            .exec()
            .with_context(|| format!("failed to run compiler for `{}`", request.package))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let diagnostics = parse_output(&text, &request.cwd);
        let code = output.status.code();
        debug!("compiler exited with {:?}, {} diagnostics", code, diagnostics.len());

        Ok(CompileOutput {
            diagnostics,
            // 0: clean, 2: diagnostics but outputs generated
            emit_skipped: !matches!(code, Some(0) | Some(2)),
        })
    }
}

static LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\): (?P<sev>error|warning|message|suggestion) (?P<code>TS\d+): (?P<msg>.*)$",
    )
    .expect("valid diagnostic pattern")
});

static GLOBAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sev>error|warning|message|suggestion) (?P<code>TS\d+): (?P<msg>.*)$")
        .expect("valid diagnostic pattern")
});

/// Parse non-pretty compiler output.
///
/// Indented lines continue the previous diagnostic. Any other non-empty line
/// becomes a plain note. Relative file paths are resolved against `cwd`.
pub fn parse_output(text: &str, cwd: &Path) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = LOCATED.captures(line) {
            let severity = caps["sev"].parse().unwrap_or(Severity::Error);
            let file = cwd.join(&caps["file"]);
            diagnostics.push(
                Diagnostic::error(&caps["msg"])
                    .severity(severity)
                    .with_code(&caps["code"])
                    .with_location(file, caps["line"].parse().ok(), caps["col"].parse().ok()),
            );
            continue;
        }

        if let Some(caps) = GLOBAL.captures(line) {
            let severity = caps["sev"].parse().unwrap_or(Severity::Error);
            diagnostics.push(
                Diagnostic::error(&caps["msg"])
                    .severity(severity)
                    .with_code(&caps["code"]),
            );
            continue;
        }

        let continues = line.starts_with(' ') || line.starts_with('\t');
        match diagnostics.last_mut() {
            Some(last) if continues && last.code.is_some() => {
                last.context.push(line.trim().to_string());
            }
            _ => diagnostics.push(Diagnostic::note(line.trim_end())),
        }
    }

    diagnostics
}

/// Whether a diagnostic fails the build.
pub fn is_failure(diagnostic: &Diagnostic) -> bool {
    matches!(diagnostic.severity, Severity::Error | Severity::Warning)
}
