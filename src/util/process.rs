//! Subprocess execution utilities.

use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};

use thiserror::Error;

/// Failures at the process spawn boundary.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to signal process {pid}: {message}")]
    Signal { pid: u32, message: String },

    #[error("failed to wait for process {pid}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        ChildExit {
            code: status.code(),
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "signal"),
        }
    }
}

/// A running child process owned by the supervisor.
///
/// `terminate` is blocking: it returns only once the process has exited.
pub trait ProcessHandle: Send {
    /// OS process id.
    fn id(&self) -> u32;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> Result<Option<ChildExit>, ProcessError>;

    /// Send a termination request and wait for the process to exit.
    fn terminate(&mut self) -> Result<ChildExit, ProcessError>;
}

/// A real OS child process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    #[cfg(unix)]
    fn send_terminate(&mut self) -> Result<(), ProcessError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self.child.id();
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            // Already gone; the wait below reaps it.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::Signal {
                pid,
                message: e.to_string(),
            }),
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> Result<(), ProcessError> {
        let pid = self.child.id();
        match self.child.kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(ProcessError::Signal {
                pid,
                message: e.to_string(),
            }),
        }
    }
}

impl ProcessHandle for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> Result<Option<ChildExit>, ProcessError> {
        let pid = self.child.id();
        self.child
            .try_wait()
            .map(|status| status.map(ChildExit::from))
            .map_err(|source| ProcessError::Wait { pid, source })
    }

    fn terminate(&mut self) -> Result<ChildExit, ProcessError> {
        if let Some(exit) = self.try_wait()? {
            return Ok(exit);
        }
        self.send_terminate()?;
        let pid = self.child.id();
        self.child
            .wait()
            .map(ChildExit::from)
            .map_err(|source| ProcessError::Wait { pid, source })
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    shell: bool,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            shell: false,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Run the command line through the platform shell.
    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = if self.shell {
            shell_command(&self.display_command())
        } else {
            let mut cmd = Command::new(&self.program);
            cmd.args(&self.args);
            cmd
        };

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command, capturing its output, and wait for completion.
    pub fn exec(&self) -> Result<Output, ProcessError> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: self.display_command(),
            source,
        })?;
        let pid = child.id();

        child
            .wait_with_output()
            .map_err(|source| ProcessError::Wait { pid, source })
    }

    /// Start the command with stdio and environment inherited from this
    /// process.
    pub fn spawn_inherited(&self) -> Result<ChildProcess, ProcessError> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: self.display_command(),
            source,
        })?;

        Ok(ChildProcess { child })
    }

    /// Run with inherited stdio and wait for the exit status.
    pub fn status(&self) -> Result<ExitStatus, ProcessError> {
        let mut child = self.spawn_inherited()?;
        let pid = child.id();
        child
            .child
            .wait()
            .map_err(|source| ProcessError::Wait { pid, source })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve a program name through PATH, keeping the bare name when it cannot
/// be found so the spawn error names what was asked for.
pub fn resolve_program(name: &str) -> PathBuf {
    find_executable(name).unwrap_or_else(|| PathBuf::from(name))
}
