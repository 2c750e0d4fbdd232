//! `moorage build` command

use anyhow::Result;

use crate::cli::{BuildArgs, GlobalArgs, MessageFormat};
use moorage::builder::{BuildEvent, TscCompiler};
use moorage::ops::{build, update_references};
use moorage::util::shell::Status;
use moorage::util::GlobalContext;

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let json = args.message_format == MessageFormat::Json;
    let shell = global.shell(json);
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;
    ws.package(&args.package)?;

    if !args.no_sync {
        let report = update_references(&ws)?;
        if json {
            let skipped = report.skipped.iter().map(|(name, _)| name.clone()).collect();
            shell.json_event(&BuildEvent::synced(report.updated.clone(), skipped).to_value());
        } else {
            for name in &report.updated {
                shell.status(Status::Updated, format!("references of {}", name));
            }
            for (name, reason) in &report.skipped {
                shell.status(Status::Skipped, format!("{} ({})", name, reason));
            }
        }
    }

    let compiler = TscCompiler::from_config(ws.config());
    if !build(&ws, &args.package, &compiler, &shell)? {
        std::process::exit(1);
    }

    Ok(())
}
