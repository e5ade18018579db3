//! `stasis restore` and `stasis revert`

use super::{console, summarize, Context};
use anyhow::{bail, Context as _, Result};
use stasis_core::backup;
use stasis_core::catalog::{self, FragmentMatch};
use stasis_core::Manifest;
use std::path::{Path, PathBuf};

fn print_file_names(paths: &[PathBuf]) {
    for path in paths {
        if let Some(name) = path.file_name() {
            println!("{}", name.to_string_lossy());
        }
    }
}

/// Remove whatever is installed now, configured or not
fn remove_current(context: &Context) -> Result<()> {
    let current = match context.current()? {
        Some(manifest) => Some(manifest),
        None => catalog::probe_unconfigured(&context.settings, &context.host)
            .context("Failed to read the default template")?,
    };

    if let Some(manifest) = current {
        println!("Removing {manifest}");
        let report = backup::uninstall(&manifest, &context.host, &mut console);
        summarize(&report, "the previous installation was not removed completely");
    }
    Ok(())
}

/// Restore from `archive` using the manifest stored inside it
fn restore_archive(context: &Context, archive: &Path) -> Result<bool> {
    let manifest = Manifest::from_archive(archive)
        .with_context(|| format!("Failed to read {}", archive.display()))?
        .with_context(|| format!("{} contains no installation.xml", archive.display()))?;

    println!("Restoring {manifest}");
    let report = backup::restore_from(
        &manifest,
        archive,
        &context.settings.installation_file,
        &context.host,
        &mut console,
    )?;
    Ok(summarize(&report, "unable to restore the installation completely"))
}

pub fn run(context: &Context, fragment: &str) -> Result<bool> {
    let base = &context.settings.base_directory;
    let archive = match catalog::find_by_fragment(base, fragment)? {
        FragmentMatch::Unique(path) => path,
        FragmentMatch::Ambiguous(candidates) => {
            println!("Ambiguous specification. Possible matches are:");
            print_file_names(&candidates);
            return Ok(false);
        }
        FragmentMatch::NoMatch(candidates) => {
            println!("No match found. Possible candidates are:");
            print_file_names(&candidates);
            return Ok(false);
        }
    };

    // Validate before anything is removed
    Manifest::from_archive(&archive)
        .with_context(|| format!("Failed to read {}", archive.display()))?
        .with_context(|| format!("{} contains no installation.xml", archive.display()))?;

    remove_current(context)?;
    restore_archive(context, &archive)
}

pub fn revert(context: &Context, index: u32) -> Result<bool> {
    let Some(manifest) = context.current()? else {
        bail!(
            "{} does not exist: revert needs a configured installation",
            context.settings.installation_file.display()
        );
    };

    let Some(snapshot) = catalog::snapshot_file(&context.settings.base_directory, &manifest, index)
    else {
        bail!("{index} is not an existing snapshot index");
    };

    println!("Removing {manifest}");
    let report = backup::uninstall(&manifest, &context.host, &mut console);
    summarize(&report, "the previous installation was not removed completely");

    println!("Reverting to snapshot #{index}");
    restore_archive(context, &snapshot)
}
