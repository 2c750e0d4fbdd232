//! Implementation of `moorage watch`.
//!
//! The supervisor owns one child-process slot for the target package. Each
//! qualifying filesystem event runs one cycle: stop the running child,
//! reconcile references across the workspace, build the target, and start it
//! again if the build succeeded.
//!
//! Only one cycle runs at a time, on a single worker thread. Events that
//! arrive while a cycle is in flight are dropped, not queued.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::builder::{Compiler, TscCompiler};
use crate::core::Workspace;
use crate::deps::compute_deps;
use crate::ops::build::build;
use crate::ops::sync::update_references;
use crate::util::process::{resolve_program, ProcessBuilder, ProcessError, ProcessHandle};
use crate::util::shell::{Shell, Status};

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Change,
    Rename,
    Unlink,
}

/// A filesystem change under the packages directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
    /// New path of a rename.
    pub renamed_to: Option<PathBuf>,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        WatchEvent {
            kind,
            path: path.into(),
            renamed_to: None,
        }
    }

    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        WatchEvent {
            kind: WatchEventKind::Rename,
            path: from.into(),
            renamed_to: Some(to.into()),
        }
    }

    /// Path a cycle is judged by: the destination of a rename, else the
    /// changed path.
    pub fn trigger_path(&self) -> &Path {
        self.renamed_to.as_deref().unwrap_or(&self.path)
    }
}

/// Translate a raw notify event. Access events produce nothing.
pub fn convert_event(event: notify::Event) -> Vec<WatchEvent> {
    let single = |kind: WatchEventKind, paths: Vec<PathBuf>| -> Vec<WatchEvent> {
        paths.into_iter().map(|p| WatchEvent::new(kind, p)).collect()
    };

    match event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => single(WatchEventKind::Add, event.paths),
        EventKind::Remove(_) => single(WatchEventKind::Unlink, event.paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
            let mut paths = event.paths.into_iter();
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => vec![WatchEvent::rename(from, to)],
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            single(WatchEventKind::Unlink, event.paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            single(WatchEventKind::Add, event.paths)
        }
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            single(WatchEventKind::Change, event.paths)
        }
    }
}

/// Whether any `ignore` substring occurs in the event's paths.
pub fn is_ignored(event: &WatchEvent, ignore: &[String]) -> bool {
    let matches = |path: &Path| {
        let text = path.to_string_lossy();
        ignore
            .iter()
            .any(|needle| !needle.is_empty() && text.contains(needle.as_str()))
    };
    matches(&event.path) || event.renamed_to.as_deref().is_some_and(matches)
}

/// Starts the built package as a child process.
pub trait Launcher: Send + Sync {
    fn launch(&self, ws: &Workspace, package: &str) -> Result<Box<dyn ProcessHandle>, ProcessError>;
}

/// Runs `{runtime.program} {runtime.args..} {dist}/{package}/{entry}` in the
/// workspace root with inherited stdio and environment.
#[derive(Debug, Clone, Default)]
pub struct NodeLauncher;

impl NodeLauncher {
    pub fn command(ws: &Workspace, package: &str) -> ProcessBuilder {
        let config = ws.config();
        ProcessBuilder::new(resolve_program(config.runtime_program()))
            .args(config.runtime_args())
            .arg(ws.entry_point(package))
            .cwd(ws.root())
    }
}

impl Launcher for NodeLauncher {
    fn launch(&self, ws: &Workspace, package: &str) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        let cmd = Self::command(ws, package);
        debug!("starting {}", cmd.display_command());
        Ok(Box::new(cmd.spawn_inherited()?))
    }
}

/// Observable supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    RebuildInFlight,
    Running,
}

/// What a trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The change does not concern the target or its dependencies.
    Ignored,
    /// Another cycle was already in flight.
    Dropped,
    /// A full cycle ran.
    Rebuilt { spawned: bool },
}

/// Clears the in-flight flag however the cycle ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Watch-rebuild-restart supervisor for one package.
pub struct Supervisor {
    ws: Workspace,
    target: String,
    compiler: Arc<dyn Compiler>,
    launcher: Arc<dyn Launcher>,
    shell: Arc<Shell>,
    in_flight: AtomicBool,
    child: Mutex<Option<Box<dyn ProcessHandle>>>,
}

impl Supervisor {
    pub fn new(
        ws: Workspace,
        target: impl Into<String>,
        compiler: Arc<dyn Compiler>,
        launcher: Arc<dyn Launcher>,
        shell: Arc<Shell>,
    ) -> Self {
        Supervisor {
            ws,
            target: target.into(),
            compiler,
            launcher,
            shell,
            in_flight: AtomicBool::new(false),
            child: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn child_slot(&self) -> MutexGuard<'_, Option<Box<dyn ProcessHandle>>> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current phase. Reaps an exited child first.
    pub fn state(&self) -> WatchPhase {
        if self.in_flight.load(Ordering::Acquire) {
            return WatchPhase::RebuildInFlight;
        }
        self.reap();
        if self.child_slot().is_some() {
            WatchPhase::Running
        } else {
            WatchPhase::Idle
        }
    }

    /// Clear the child slot if the process has exited.
    pub fn reap(&self) {
        let mut slot = self.child_slot();
        let Some(handle) = slot.as_mut() else {
            return;
        };
        match handle.try_wait() {
            Ok(None) => {}
            Ok(Some(exit)) => {
                info!("{} exited with {}", self.target, exit);
                self.shell
                    .status(Status::Stopped, format!("{} ({})", self.target, exit));
                *slot = None;
            }
            Err(e) => {
                warn!("lost track of {}: {:#}", self.target, anyhow::Error::from(e));
                *slot = None;
            }
        }
    }

    /// Whether a change at `path` concerns the target: it lies in the target
    /// package or in one of its current direct dependencies.
    pub fn is_relevant(&self, path: &Path) -> Result<bool> {
        self.any_relevant(&[path])
    }

    /// Whether any of `paths` concerns the target. Scans the target's
    /// imports at most once.
    fn any_relevant(&self, paths: &[&Path]) -> Result<bool> {
        let packages: Vec<String> = paths
            .iter()
            .filter_map(|path| self.ws.package_of_path(path))
            .collect();
        if packages.is_empty() {
            return Ok(false);
        }
        if packages.iter().any(|package| *package == self.target) {
            return Ok(true);
        }
        let deps = compute_deps(&self.ws, &self.target)?;
        Ok(packages.iter().any(|package| deps.contains(package)))
    }

    /// Run one cycle for a change at `changed` (`None` for the startup or
    /// an external trigger).
    pub fn trigger(&self, changed: Option<&Path>) -> Result<CycleOutcome> {
        match changed {
            Some(path) => self.trigger_batch(&[path]),
            None => self.start_cycle(None),
        }
    }

    /// Run at most one cycle for a batch of changed paths.
    pub fn trigger_batch(&self, changed: &[&Path]) -> Result<CycleOutcome> {
        if changed.is_empty() {
            return Ok(CycleOutcome::Ignored);
        }
        // Unrelated changes never take the in-flight slot
        if self.in_flight.load(Ordering::Acquire) {
            debug!("rebuild already in flight, dropping event");
            return Ok(CycleOutcome::Dropped);
        }
        if !self.any_relevant(changed)? {
            debug!("ignoring {} unrelated change(s)", changed.len());
            return Ok(CycleOutcome::Ignored);
        }
        self.start_cycle(changed.last().copied())
    }

    fn start_cycle(&self, changed: Option<&Path>) -> Result<CycleOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("rebuild already in flight, dropping event");
            return Ok(CycleOutcome::Dropped);
        }
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(path) = changed {
            self.shell
                .status(Status::Info, format!("change in {}", path.display()));
        }
        self.run_cycle()
    }

    fn run_cycle(&self) -> Result<CycleOutcome> {
        self.stop_child()
            .with_context(|| format!("failed to stop {}, not restarting it", self.target))?;

        let report = update_references(&self.ws)?;
        for name in &report.updated {
            self.shell.status(Status::Updated, format!("references of {}", name));
        }
        for (name, reason) in &report.skipped {
            self.shell.status(Status::Skipped, format!("{}: {}", name, reason));
        }

        if !build(&self.ws, &self.target, self.compiler.as_ref(), &self.shell)? {
            self.shell
                .status(Status::Watching, "build failed, waiting for changes");
            return Ok(CycleOutcome::Rebuilt { spawned: false });
        }

        match self.launcher.launch(&self.ws, &self.target) {
            Ok(handle) => {
                self.shell.status(
                    Status::Running,
                    format!("{} (pid {})", self.target, handle.id()),
                );
                *self.child_slot() = Some(handle);
                Ok(CycleOutcome::Rebuilt { spawned: true })
            }
            Err(e) => {
                let e = anyhow::Error::from(e);
                warn!("{:#}", e);
                self.shell.error(format!("{:#}", e));
                Ok(CycleOutcome::Rebuilt { spawned: false })
            }
        }
    }

    /// Terminate the running child and wait for it to exit.
    ///
    /// If termination fails the handle stays in the slot, so a new child is
    /// never started next to one that may still be alive.
    pub fn stop_child(&self) -> Result<(), ProcessError> {
        let mut slot = self.child_slot();
        let Some(handle) = slot.as_mut() else {
            return Ok(());
        };

        let pid = handle.id();
        let exit = handle.terminate()?;
        debug!("process {} stopped with {}", pid, exit);
        *slot = None;
        drop(slot);
        self.shell.status(Status::Stopped, &self.target);
        Ok(())
    }

    fn report(&self, result: Result<CycleOutcome>) {
        match result {
            Ok(outcome) => debug!("cycle outcome: {:?}", outcome),
            Err(e) => self.shell.error(format!("{:#}", e)),
        }
    }

    /// Event loop. Runs the startup cycle, then feeds qualifying events to a
    /// single worker until `events` disconnects. The child is stopped on
    /// return.
    ///
    /// Events that arrive while a cycle is in flight are dropped here; the
    /// worker takes whatever queued up since its last pass as one batch.
    pub fn run(self: &Arc<Self>, events: &Receiver<WatchEvent>) {
        let poll = Duration::from_millis(self.ws.config().poll_interval_ms());
        let ignore = self.ws.config().watch.ignore.clone();
        let (tx, rx) = crossbeam_channel::unbounded::<PathBuf>();

        let worker = {
            let supervisor = Arc::clone(self);
            thread::spawn(move || supervisor.work(&rx))
        };

        loop {
            match events.recv_timeout(poll) {
                Ok(event) => {
                    if is_ignored(&event, &ignore) {
                        continue;
                    }
                    if self.in_flight.load(Ordering::Acquire) {
                        debug!("rebuild in flight, dropping {}", event.trigger_path().display());
                        continue;
                    }
                    debug!("{:?} {}", event.kind, event.trigger_path().display());
                    if tx.send(event.trigger_path().to_path_buf()).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if !self.in_flight.load(Ordering::Acquire) {
                self.reap();
            }
        }

        drop(tx);
        if worker.join().is_err() {
            warn!("watch worker panicked");
        }
        if let Err(e) = self.stop_child() {
            self.shell.error(format!("{:#}", anyhow::Error::from(e)));
        }
    }

    fn work(&self, changes: &Receiver<PathBuf>) {
        self.report(self.trigger(None));
        // Anything queued during the startup cycle arrived while in flight
        changes.try_iter().for_each(drop);

        while let Ok(first) = changes.recv() {
            let mut batch = vec![first];
            batch.extend(changes.try_iter());
            let paths: Vec<&Path> = batch.iter().map(PathBuf::as_path).collect();

            let result = self.trigger_batch(&paths);
            if matches!(result, Ok(CycleOutcome::Rebuilt { .. }) | Err(_)) {
                changes.try_iter().for_each(drop);
            }
            self.report(result);
        }
    }
}

/// Recursive notify watcher over a directory.
pub struct PackageWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<WatchEvent>,
}

impl PackageWatcher {
    pub fn new(dir: &Path) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for change in convert_event(event) {
                        let _ = tx.send(change);
                    }
                }
                Err(e) => warn!("watch error: {}", e),
            }
        })
        .context("failed to create file watcher")?;

        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;

        Ok(PackageWatcher {
            _watcher: watcher,
            events: rx,
        })
    }

    pub fn events(&self) -> &Receiver<WatchEvent> {
        &self.events
    }
}

/// Watch the packages directory and supervise `package` until the process
/// is interrupted.
pub fn watch(ws: Workspace, package: &str, shell: Arc<Shell>) -> Result<()> {
    ws.package(package)?;

    let watcher = PackageWatcher::new(&ws.packages_dir())?;
    shell.status(
        Status::Watching,
        format!("{} for {}", ws.packages_dir().display(), package),
    );

    let compiler = Arc::new(TscCompiler::from_config(ws.config()));
    let supervisor = Arc::new(Supervisor::new(
        ws,
        package,
        compiler,
        Arc::new(NodeLauncher),
        shell,
    ));
    supervisor.run(watcher.events());
    Ok(())
}
