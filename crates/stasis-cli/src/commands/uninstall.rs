//! `stasis uninstall`

use super::{console, summarize, Context};
use anyhow::{bail, Result};
use stasis_core::backup;

pub fn run(context: &Context) -> Result<bool> {
    let Some(manifest) = context.current()? else {
        bail!("No installation found: please check manually");
    };

    println!("Removing {manifest}");
    let report = backup::uninstall(&manifest, &context.host, &mut console);
    Ok(summarize(
        &report,
        "unable to completely remove the existing installation: please check manually",
    ))
}
