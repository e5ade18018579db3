//! Restore engine

use super::{EngineError, OperationReport};
use crate::archive::{archive_path, ArchiveReader};
use crate::host::{Host, ProgressSink};
use crate::manifest::Manifest;
use std::path::Path;
use tracing::info;

/// Restore `manifest` from its named archive in `base_dir`
///
/// # Errors
/// See [`restore_from`]
pub fn restore(
    manifest: &Manifest,
    base_dir: &Path,
    live_config: &Path,
    host: &Host,
    progress: &mut dyn ProgressSink,
) -> Result<OperationReport, EngineError> {
    let archive = archive_path(base_dir, &manifest.archive);
    restore_from(manifest, &archive, live_config, host, progress)
}

/// Restore every item of `manifest` from the archive at `archive`, then
/// overwrite `live_config` with the manifest
///
/// Items are restored in manifest order whatever their individual results.
/// Shutdown hooks do not run here; callers uninstall the previous state first.
///
/// # Errors
/// Returns an error if the archive cannot be opened or the live
/// configuration cannot be written
pub fn restore_from(
    manifest: &Manifest,
    archive: &Path,
    live_config: &Path,
    host: &Host,
    progress: &mut dyn ProgressSink,
) -> Result<OperationReport, EngineError> {
    progress.report(&format!("Opening '{}'", archive.display()));
    let mut reader = ArchiveReader::open(archive)?;

    let mut report = OperationReport::new(Some(archive));
    for item in &manifest.items {
        let description = item.describe();
        progress.report(&description);
        let success = item.restore(&mut reader, host);
        report.record(description, success);
    }

    manifest.write_to(live_config)?;
    info!("Wrote {}", live_config.display());
    progress.report("Done.");
    Ok(report)
}
