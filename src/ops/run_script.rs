//! Implementation of `moorage run`.
//!
//! Runs a script declared in a package descriptor's `scripts` table through
//! the platform shell, from the package directory, with inherited stdio and
//! environment.

use anyhow::{bail, Result};
use tracing::debug;

use crate::core::{ScriptSpec, Workspace};
use crate::util::process::{ChildExit, ProcessBuilder};

/// Script run when none is named.
pub const DEFAULT_SCRIPT: &str = "dev";

/// `npm` needs its `.cmd` shim on Windows.
fn platform_command(command: &str) -> String {
    if cfg!(windows) && command == "npm" {
        format!("{}.cmd", command)
    } else {
        command.to_string()
    }
}

/// Build the command for `script` (default `dev`) of `package`.
pub fn script_command(ws: &Workspace, package: &str, script: Option<&str>) -> Result<ProcessBuilder> {
    let pkg = ws.package(package)?;
    let document = pkg.load_descriptor()?;
    let scripts = &document.descriptor().scripts;
    let name = script.unwrap_or(DEFAULT_SCRIPT);

    let Some(ScriptSpec { command, args }) = scripts.get(name) else {
        bail!(
            "package `{}` has no script `{}`\n\
             available scripts: {}",
            package,
            name,
            if scripts.is_empty() {
                "(none)".to_string()
            } else {
                scripts.keys().cloned().collect::<Vec<_>>().join(", ")
            }
        );
    };

    Ok(ProcessBuilder::new(platform_command(command))
        .args(args)
        .cwd(pkg.root())
        .shell(true))
}

/// Run a package script to completion.
pub fn run_script(
    ws: &Workspace,
    package: &str,
    script: Option<&str>,
    extra_args: &[String],
) -> Result<ChildExit> {
    let cmd = script_command(ws, package, script)?.args(extra_args);
    debug!("running {}", cmd.display_command());
    Ok(ChildExit::from(cmd.status()?))
}
