//! `moorage deps` command

use anyhow::Result;

use crate::cli::DepsArgs;
use moorage::deps::graph::{classify, compute_deps, mentions};
use moorage::deps::SpecifierKind;
use moorage::util::fs::{relative_path, to_slash};
use moorage::util::GlobalContext;

pub fn execute(args: DepsArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;
    ws.package(&args.package)?;

    if args.mentions {
        for mention in mentions(&ws, &args.package)? {
            let kind = match classify(ws.prefix(), &mention.specifier) {
                SpecifierKind::Relative => "relative",
                SpecifierKind::Workspace(_) => "workspace",
                SpecifierKind::External => "external",
            };
            let type_only = if mention.type_only { " (type)" } else { "" };
            println!(
                "{}\t{}\t{}{}",
                to_slash(&relative_path(ws.root(), &mention.referencing_path)),
                kind,
                mention.specifier,
                type_only
            );
        }
        return Ok(());
    }

    for dep in compute_deps(&ws, &args.package)? {
        println!("{}", dep);
    }

    Ok(())
}
