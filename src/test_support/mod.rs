//! Test utilities and mocks for Moorage unit tests.
//!
//! This module provides temporary workspaces plus recording implementations
//! of the [`Compiler`] and [`Launcher`] seams, so the supervisor can be
//! exercised without running a real compiler or child process.
//!
//! # Example
//!
//! ```rust,ignore
//! use moorage::test_support::{EventLog, MockCompiler, MockLauncher, WorkspaceFixture};
//!
//! #[test]
//! fn test_example() {
//!     let fx = WorkspaceFixture::new().package("server");
//!     let log = EventLog::default();
//!     let compiler = MockCompiler::succeeding().with_log(log.clone());
//!     let launcher = MockLauncher::new(log.clone());
//!     // Drive a Supervisor, then inspect log.entries()...
//! }
//! ```

pub mod fixtures;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};

use crate::builder::{CompileOutput, CompileRequest, Compiler};
use crate::core::Workspace;
use crate::ops::watch::Launcher;
use crate::util::diagnostic::Diagnostic;
use crate::util::process::{ChildExit, ProcessError, ProcessHandle};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Ordered record of side effects shared between mocks.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Test-side handle for a [`MockCompiler::gated`] compiler.
pub struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl Gate {
    /// Block until a compile call is in progress.
    pub fn wait_entered(&self) {
        self.entered.recv().unwrap();
    }

    /// Let the blocked compile call finish.
    pub fn release(&self) {
        self.release.send(()).unwrap();
    }
}

struct CompilerGate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// A compiler returning a fixed result and recording every request.
pub struct MockCompiler {
    output: CompileOutput,
    requests: Mutex<Vec<CompileRequest>>,
    log: Option<EventLog>,
    gate: Option<CompilerGate>,
}

impl MockCompiler {
    pub fn with_output(output: CompileOutput) -> Self {
        MockCompiler {
            output,
            requests: Mutex::new(Vec::new()),
            log: None,
            gate: None,
        }
    }

    pub fn succeeding() -> Self {
        Self::with_output(CompileOutput::success())
    }

    pub fn failing() -> Self {
        Self::with_output(CompileOutput {
            diagnostics: vec![Diagnostic::error("Type 'string' is not assignable to type 'number'.")
                .with_code("TS2322")],
            emit_skipped: true,
        })
    }

    /// A succeeding compiler that blocks inside `compile` until released.
    pub fn gated() -> (Self, Gate) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let mut compiler = Self::succeeding();
        compiler.gate = Some(CompilerGate {
            entered: entered_tx,
            release: release_rx,
        });
        (
            compiler,
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    /// Record `build:{package}` into `log` on every call.
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Compiler for MockCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(log) = &self.log {
            log.push(format!("build:{}", request.package));
        }
        if let Some(gate) = &self.gate {
            gate.entered.send(()).unwrap();
            gate.release.recv().unwrap();
        }
        Ok(self.output.clone())
    }
}

/// A fake child process. Exits only when terminated or told to.
pub struct MockProcess {
    id: u32,
    log: EventLog,
    exit: Arc<Mutex<Option<ChildExit>>>,
    stubborn: bool,
}

impl ProcessHandle for MockProcess {
    fn id(&self) -> u32 {
        self.id
    }

    fn try_wait(&mut self) -> Result<Option<ChildExit>, ProcessError> {
        Ok(*self.exit.lock().unwrap())
    }

    fn terminate(&mut self) -> Result<ChildExit, ProcessError> {
        let mut exit = self.exit.lock().unwrap();
        if let Some(done) = *exit {
            return Ok(done);
        }
        if self.stubborn {
            self.log.push(format!("terminate-failed:{}", self.id));
            return Err(ProcessError::Signal {
                pid: self.id,
                message: "operation not permitted".to_string(),
            });
        }
        self.log.push(format!("terminate:{}", self.id));
        let done = ChildExit { code: None };
        *exit = Some(done);
        Ok(done)
    }
}

/// A launcher handing out [`MockProcess`]es with ids 1, 2, 3...
pub struct MockLauncher {
    log: EventLog,
    next_id: AtomicU32,
    fail: bool,
    stubborn: bool,
    processes: Mutex<Vec<Arc<Mutex<Option<ChildExit>>>>>,
}

impl MockLauncher {
    pub fn new(log: EventLog) -> Self {
        MockLauncher {
            log,
            next_id: AtomicU32::new(1),
            fail: false,
            stubborn: false,
            processes: Mutex::new(Vec::new()),
        }
    }

    /// A launcher whose every spawn fails.
    pub fn failing(log: EventLog) -> Self {
        MockLauncher {
            fail: true,
            ..Self::new(log)
        }
    }

    /// A launcher whose processes cannot be terminated.
    pub fn stubborn(log: EventLog) -> Self {
        MockLauncher {
            stubborn: true,
            ..Self::new(log)
        }
    }

    pub fn launches(&self) -> usize {
        self.processes.lock().unwrap().len()
    }

    /// Make every launched process exit on its own with `code`.
    pub fn exit_all(&self, code: i32) {
        for exit in self.processes.lock().unwrap().iter() {
            exit.lock().unwrap().get_or_insert(ChildExit { code: Some(code) });
        }
    }
}

impl Launcher for MockLauncher {
    fn launch(&self, _ws: &Workspace, package: &str) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        if self.fail {
            return Err(ProcessError::Spawn {
                command: format!("node {}", package),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "node not found"),
            });
        }

        self.log.push(format!("spawn:{}", package));
        let exit = Arc::new(Mutex::new(None));
        self.processes.lock().unwrap().push(Arc::clone(&exit));

        Ok(Box::new(MockProcess {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            log: self.log.clone(),
            exit,
            stubborn: self.stubborn,
        }))
    }
}
