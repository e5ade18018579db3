//! Backup engine

use super::{BackupMode, EngineError, OperationReport};
use crate::archive::{archive_path, ArchiveWriter};
use crate::host::{Host, ProgressSink};
use crate::manifest::{Manifest, MANIFEST_FILE_NAME};
use crate::snapshot::SnapshotSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Back up every item of `manifest` into one archive in `base_dir`
///
/// Shutdown hooks run first. The manifest is the first archive entry,
/// followed by each item's payload in manifest order.
///
/// # Errors
/// Returns an error if the archive cannot be created, the manifest entry
/// cannot be written, or the archive cannot be finalized
pub fn backup(
    manifest: &Manifest,
    base_dir: &Path,
    mode: BackupMode,
    host: &Host,
    progress: &mut dyn ProgressSink,
) -> Result<OperationReport, EngineError> {
    manifest.shutdown(host);

    fs::create_dir_all(base_dir).map_err(|source| EngineError::BaseDirectory {
        path: base_dir.to_path_buf(),
        source,
    })?;

    let mut target = archive_path(base_dir, &manifest.archive);
    if let BackupMode::Snapshot { max_snapshots } = mode {
        let snapshots = SnapshotSet::for_archive(&target);
        snapshots.rotate(max_snapshots);
        target = snapshots.path(0);
    }

    progress.report(&format!("Creating '{}'", target.display()));
    let mut writer = ArchiveWriter::create(&target)?;
    writer.add_text(MANIFEST_FILE_NAME, &manifest.to_xml()?)?;

    let mut report = OperationReport::new(Some(&target));
    for item in &manifest.items {
        let description = item.describe();
        progress.report(&description);
        let success = item.backup(&mut writer, host);
        report.record(description, success);
    }

    progress.report("Compressing...");
    writer.finish()?;
    progress.report("Done.");

    if report.is_success() {
        info!("Backed up {manifest} to {}", target.display());
    } else {
        warn!(
            "Backup of {manifest} to {} is incomplete: {} item(s) failed",
            target.display(),
            report.failed.len()
        );
    }
    Ok(report)
}
