//! `moorage resolve` command
//!
//! Prints what the runtime loader should continue with: a `file://` URL for
//! workspace modules, the specifier unchanged otherwise.

use anyhow::Result;
use url::Url;

use crate::cli::ResolveArgs;
use moorage::loader::ModuleResolver;
use moorage::util::GlobalContext;

pub fn execute(args: ResolveArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;
    let resolver = ModuleResolver::new(&ws);

    let parent = args
        .from
        .as_deref()
        .map(|from| module_url(ctx.cwd(), from))
        .transpose()?;

    let resolution = resolver.resolve(&args.specifier, parent.as_ref())?;
    println!("{}", resolution.specifier());

    Ok(())
}

/// A `file://` URL as given, or a path relative to `cwd`.
pub fn module_url(cwd: &std::path::Path, module: &str) -> Result<Url> {
    if module.starts_with("file:") {
        return Ok(Url::parse(module)?);
    }
    let path = cwd.join(module);
    Url::from_file_path(&path)
        .map_err(|_| anyhow::anyhow!("cannot convert {} to a file URL", path.display()))
}
