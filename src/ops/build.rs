//! Implementation of `moorage build`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use tracing::debug;

use crate::builder::compiler::is_failure;
use crate::builder::{BuildEvent, CompileRequest, Compiler};
use crate::core::{DescriptorDocument, DescriptorError, Workspace};
use crate::util::diagnostic::{format_all, suggestions, Diagnostic};
use crate::util::fs::normalize_lexically;
use crate::util::shell::{format_duration, Shell, Status};

/// Descriptors a package's build depends on.
#[derive(Debug, Clone, Default)]
pub struct ReferenceClosure {
    /// Reachable descriptors, dependencies before dependents, excluding the
    /// root descriptor.
    pub descriptors: Vec<PathBuf>,
    /// Problems found while following references.
    pub diagnostics: Vec<Diagnostic>,
}

impl ReferenceClosure {
    /// Package directory names of the closure.
    pub fn package_names(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .filter_map(|d| d.parent()?.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// Follow `references` transitively from `root`.
///
/// Each descriptor is visited once, so reference cycles terminate. Missing
/// or unreadable referenced descriptors become diagnostics.
pub fn reference_closure(root: &DescriptorDocument) -> ReferenceClosure {
    let mut closure = ReferenceClosure::default();
    let mut seen = HashSet::new();
    seen.insert(normalize_lexically(root.path()));
    visit_references(root, &mut seen, &mut closure);
    closure
}

fn visit_references(
    document: &DescriptorDocument,
    seen: &mut HashSet<PathBuf>,
    closure: &mut ReferenceClosure,
) {
    for reference in document.descriptor().sorted_reference_paths() {
        let path = resolve_reference(document.dir(), &reference);
        if !seen.insert(path.clone()) {
            continue;
        }

        match DescriptorDocument::load(&path) {
            Ok(child) => {
                visit_references(&child, seen, closure);
                closure.descriptors.push(path);
            }
            Err(e) => {
                let message = match e {
                    DescriptorError::Missing { .. } => {
                        format!("referenced project `{}` does not exist", reference)
                    }
                    other => format!("{:#}", anyhow::Error::from(other)),
                };
                closure.diagnostics.push(
                    Diagnostic::error(message)
                        .with_location(document.path(), None, None)
                        .with_suggestion(suggestions::STALE_REFERENCES),
                );
            }
        }
    }
}

/// A reference may name a descriptor file or the directory holding one.
fn resolve_reference(dir: &Path, reference: &str) -> PathBuf {
    let path = normalize_lexically(&dir.join(reference));
    if path.extension().is_some_and(|e| e == "json") {
        path
    } else {
        path.join("tsconfig.json")
    }
}

/// Compile `name` with `compiler`, printing its diagnostics.
///
/// Returns `Ok(true)` only when nothing was reported and output was written.
/// A missing or invalid descriptor for `name` is an error.
pub fn build(ws: &Workspace, name: &str, compiler: &dyn Compiler, shell: &Shell) -> Result<bool> {
    let started = Instant::now();
    let package = ws.package(name)?;
    let document = package.load_descriptor()?;

    let closure = reference_closure(&document);
    let references = closure.package_names();
    debug!("reference closure of {}: {:?}", name, references);

    let request = CompileRequest {
        package: name.to_string(),
        descriptor: package.descriptor_path().to_path_buf(),
        references: closure.descriptors.clone(),
        cwd: ws.root().to_path_buf(),
    };

    if shell.is_json() {
        shell.json_event(
            &BuildEvent::started(name, request.descriptor.clone(), references.clone()).to_value(),
        );
    } else {
        shell.status(Status::Compiling, name);
    }

    let spinner = shell.spinner(format!("compiling {}", name));
    let result = compiler.compile(&request);
    spinner.finish();
    let output = result?;

    let mut diagnostics = closure.diagnostics;
    diagnostics.extend(output.diagnostics);

    let success = !diagnostics.iter().any(is_failure) && !output.emit_skipped;
    let elapsed = started.elapsed();

    if shell.is_json() {
        for diagnostic in &diagnostics {
            shell.json_event(&BuildEvent::diagnostic(name, diagnostic).to_value());
        }
        shell.json_event(
            &BuildEvent::finished(name, success, output.emit_skipped, elapsed.as_millis() as u64)
                .to_value(),
        );
    } else {
        shell.print_block(&format_all(&diagnostics, shell.use_color()));
        if success {
            shell.status(
                Status::Finished,
                format!("{} in {}", name, format_duration(elapsed)),
            );
        } else {
            let failures = diagnostics.iter().filter(|d| is_failure(d)).count();
            shell.status(
                Status::Error,
                format!("could not compile `{}` ({} diagnostics)", name, failures),
            );
        }
    }

    Ok(success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CompileOutput;
    use crate::test_support::{MockCompiler, WorkspaceFixture};

    fn refs(deps: &[&str]) -> String {
        let list: Vec<String> = deps
            .iter()
            .map(|d| format!(r#"{{ "path": "../{}/tsconfig.package.json" }}"#, d))
            .collect();
        format!(r#"{{ "references": [{}] }}"#, list.join(", "))
    }

    #[test]
    fn test_clean_build_succeeds() {
        let fx = WorkspaceFixture::new().package("server");
        let compiler = MockCompiler::succeeding();

        let ok = build(&fx.workspace(), "server", &compiler, &Shell::quiet()).unwrap();
        assert!(ok);

        let calls = compiler.requests();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].descriptor.ends_with("packages/server/tsconfig.package.json"));
        assert_eq!(calls[0].cwd, fx.root());
    }

    #[test]
    fn test_diagnostics_fail_the_build() {
        let fx = WorkspaceFixture::new().package("server");
        let compiler = MockCompiler::with_output(CompileOutput {
            diagnostics: vec![Diagnostic::error("Cannot find name 'x'.").with_code("TS2304")],
            emit_skipped: false,
        });
        assert!(!build(&fx.workspace(), "server", &compiler, &Shell::quiet()).unwrap());
    }

    #[test]
    fn test_skipped_emit_fails_the_build() {
        let fx = WorkspaceFixture::new().package("server");
        let compiler = MockCompiler::with_output(CompileOutput {
            diagnostics: Vec::new(),
            emit_skipped: true,
        });
        assert!(!build(&fx.workspace(), "server", &compiler, &Shell::quiet()).unwrap());
    }

    #[test]
    fn test_missing_descriptor_is_an_error() {
        let fx = WorkspaceFixture::new().package_without_descriptor("server");
        let compiler = MockCompiler::succeeding();

        let err = build(&fx.workspace(), "server", &compiler, &Shell::quiet()).unwrap_err();
        assert!(err.downcast_ref::<DescriptorError>().is_some());
        assert!(compiler.requests().is_empty());
    }

    #[test]
    fn test_reference_closure_is_transitive_and_cycle_safe() {
        let fx = WorkspaceFixture::new()
            .package("a")
            .package("b")
            .package("c")
            .descriptor("a", &refs(&["b"]))
            .descriptor("b", &refs(&["c"]))
            .descriptor("c", &refs(&["a"]));
        let ws = fx.workspace();

        let doc = ws.package("a").unwrap().load_descriptor().unwrap();
        let closure = reference_closure(&doc);
        assert_eq!(closure.package_names(), vec!["c", "b"]);
        assert!(closure.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_reference_is_a_configuration_diagnostic() {
        let fx = WorkspaceFixture::new()
            .package("a")
            .descriptor("a", &refs(&["gone"]));
        let compiler = MockCompiler::succeeding();

        let ok = build(&fx.workspace(), "a", &compiler, &Shell::quiet()).unwrap();
        assert!(!ok);
        assert_eq!(compiler.requests().len(), 1);

        let doc = fx.workspace().package("a").unwrap().load_descriptor().unwrap();
        let closure = reference_closure(&doc);
        assert_eq!(closure.diagnostics.len(), 1);
        assert!(closure.diagnostics[0].message.contains("../gone/tsconfig.package.json"));
    }
}
