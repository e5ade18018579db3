//! `stasis backup` and `stasis snapshot`

use super::{console, summarize, Context};
use anyhow::{bail, Context as _, Result};
use stasis_core::backup::{self, BackupMode};
use stasis_core::Manifest;

/// Identity for a backup without a live configuration, seeded from the template
fn from_template(context: &Context, args: &[String]) -> Result<Manifest> {
    let (name, archive) = match args {
        [archive] => ("", archive.as_str()),
        [name, archive] => (name.as_str(), archive.as_str()),
        _ => bail!(
            "Cannot back up: {} does not exist and no archive name was given",
            context.settings.installation_file.display()
        ),
    };

    let base = &context.settings.base_directory;
    Manifest::from_default(base, name, archive)
        .context("Failed to read the default template")?
        .with_context(|| format!("No default installation.xml exists in '{}'", base.display()))
}

fn rename(manifest: &mut Manifest, args: &[String]) -> Result<()> {
    match args {
        [] => {}
        [archive] => manifest.archive.clone_from(archive),
        [name, archive] => {
            manifest.name.clone_from(name);
            manifest.archive.clone_from(archive);
        }
        _ => bail!("backup takes at most a name and an archive id"),
    }
    Ok(())
}

pub fn run(context: &Context, args: &[String]) -> Result<bool> {
    let manifest = match context.current()? {
        Some(mut manifest) => {
            rename(&mut manifest, args)?;
            if !args.is_empty() {
                manifest
                    .write_to(&context.settings.installation_file)
                    .context("Failed to update the live configuration")?;
            }
            manifest
        }
        None => from_template(context, args)?,
    };

    println!("Creating backup {manifest}");
    let report = backup::backup(
        &manifest,
        &context.settings.base_directory,
        BackupMode::Archive,
        &context.host,
        &mut console,
    )?;
    Ok(summarize(&report, "unable to back up the installation"))
}

pub fn snapshot(context: &Context) -> Result<bool> {
    let Some(manifest) = context.current()? else {
        bail!(
            "{} does not exist: snapshots need a configured installation",
            context.settings.installation_file.display()
        );
    };

    println!("Creating snapshot {manifest}");
    let report = backup::backup(
        &manifest,
        &context.settings.base_directory,
        BackupMode::Snapshot {
            max_snapshots: context.settings.max_snapshots,
        },
        &context.host,
        &mut console,
    )?;
    Ok(summarize(&report, "unable to snapshot the installation"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_by_argument_count() {
        let mut manifest = Manifest::new("Main", "PROAKT_MAIN");

        rename(&mut manifest, &[]).unwrap();
        assert_eq!(manifest.archive, "PROAKT_MAIN");

        rename(&mut manifest, &["PROAKT_NEXT".to_string()]).unwrap();
        assert_eq!(manifest.name, "Main");
        assert_eq!(manifest.archive, "PROAKT_NEXT");

        rename(&mut manifest, &["Next".to_string(), "PROAKT_N2".to_string()]).unwrap();
        assert_eq!(manifest.name, "Next");
        assert_eq!(manifest.archive, "PROAKT_N2");

        let three: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();
        assert!(rename(&mut manifest, &three).is_err());
    }
}
