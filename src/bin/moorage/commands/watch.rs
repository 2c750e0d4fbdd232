//! `moorage watch` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GlobalArgs, WatchArgs};
use moorage::ops::watch;
use moorage::util::GlobalContext;

pub fn execute(args: WatchArgs, global: &GlobalArgs) -> Result<()> {
    let shell = Arc::new(global.shell(false));
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;

    watch(ws, &args.package, shell)
}
