//! `moorage run` command

use anyhow::Result;

use crate::cli::{GlobalArgs, RunArgs};
use moorage::ops::{run_script, DEFAULT_SCRIPT};
use moorage::util::shell::Status;
use moorage::util::GlobalContext;

pub fn execute(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    let shell = global.shell(false);
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;

    let script = args.script.as_deref().unwrap_or(DEFAULT_SCRIPT);
    shell.status(Status::Running, format!("`{}` in {}", script, args.package));

    let exit = run_script(&ws, &args.package, Some(script), &args.args)?;
    if !exit.success() {
        std::process::exit(exit.code.unwrap_or(1));
    }

    Ok(())
}
