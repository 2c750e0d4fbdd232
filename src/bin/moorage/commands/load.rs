//! `moorage load` command

use anyhow::Result;

use super::resolve::module_url;
use crate::cli::LoadArgs;
use moorage::loader::{LoadResult, ModuleLoader};
use moorage::util::GlobalContext;

/// Printed when the host's own loader should read the module.
const DEFAULT_MARKER: &str = "default";

pub fn execute(args: LoadArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;
    let loader = ModuleLoader::new(&ws);

    let url = module_url(ctx.cwd(), &args.module)?;
    match loader.load(&url)? {
        LoadResult::Module { source, .. } => print!("{}", source),
        LoadResult::Default => println!("{}", DEFAULT_MARKER),
    }

    Ok(())
}
