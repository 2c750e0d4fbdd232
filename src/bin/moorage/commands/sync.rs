//! `moorage sync` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GlobalArgs, SyncArgs};
use moorage::ops::{
    check_references, sync_package_with, update_references, update_references_deep, SyncMode,
};
use moorage::util::shell::Status;
use moorage::util::GlobalContext;

pub fn execute(args: SyncArgs, global: &GlobalArgs) -> Result<()> {
    let shell = Arc::new(global.shell(false));
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;

    let mode = if args.check {
        SyncMode::Check
    } else {
        SyncMode::Write
    };

    match args.package {
        Some(package) if args.deep => {
            let span = shell.span(Status::Syncing, format!("{} and its dependencies", package));
            let report = update_references_deep(&ws, &package)?;
            for (name, reason) in &report.skipped {
                shell.status(Status::Skipped, format!("{} ({})", name, reason));
            }
            for (name, deps) in &report.visited {
                let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                println!("{}: [{}]", name, deps.join(", "));
            }
            span.finish_with_message(format!("{} packages", report.visited.len()));
        }
        Some(package) => {
            let outcome = sync_package_with(&ws, &package, mode)?;
            if !outcome.changed {
                shell.status(Status::Fresh, &package);
            } else if mode == SyncMode::Check {
                shell.error(format!("references of `{}` are out of date", package));
                std::process::exit(1);
            } else {
                shell.status(Status::Updated, &package);
            }
        }
        None => {
            let span = shell.span(Status::Syncing, "workspace references");
            let report = match mode {
                SyncMode::Write => update_references(&ws)?,
                SyncMode::Check => check_references(&ws)?,
            };

            for (name, reason) in &report.skipped {
                shell.status(Status::Skipped, format!("{} ({})", name, reason));
            }

            if mode == SyncMode::Check {
                drop(span);
                if !report.is_clean() {
                    for name in &report.updated {
                        shell.error(format!("references of `{}` are out of date", name));
                    }
                    std::process::exit(1);
                }
                shell.status(Status::Fresh, "all references are up to date");
                return Ok(());
            }

            for name in &report.updated {
                shell.status(Status::Updated, name);
            }
            span.finish_with_message(format!(
                "{} updated, {} unchanged",
                report.updated.len(),
                report.unchanged.len()
            ));
        }
    }

    Ok(())
}
