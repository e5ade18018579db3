//! Numbered snapshot files and their rotation
//!
//! Snapshots of archive `X` live next to it as `X@0.zip`, `X@1.zip`, and so
//! on. Rotation evicts the oldest index and shifts every other index up by
//! one, leaving the caller to write the newest backup at index 0.

use crate::util::clear_readonly;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Highest snapshot index ever kept
pub const MAX_SNAPSHOT_LIMIT: u32 = 999;

/// Snapshot limit actually applied: non-positive means unbounded, capped at 999
#[must_use]
pub fn effective_limit(max_snapshots: i32) -> u32 {
    match u32::try_from(max_snapshots) {
        Ok(0) | Err(_) => MAX_SNAPSHOT_LIMIT,
        Ok(n) => n.min(MAX_SNAPSHOT_LIMIT),
    }
}

/// The snapshot files belonging to one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSet {
    stem: PathBuf,
}

impl SnapshotSet {
    /// Snapshot set for the archive at `archive_path` (a trailing `.zip` is dropped)
    #[must_use]
    pub fn for_archive(archive_path: &Path) -> Self {
        let is_zip = archive_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        let stem = if is_zip {
            archive_path.with_extension("")
        } else {
            archive_path.to_path_buf()
        };
        Self { stem }
    }

    /// Snapshot set for `archive_id` in `base_dir`
    #[must_use]
    pub fn new(base_dir: &Path, archive_id: &str) -> Self {
        Self::for_archive(&base_dir.join(archive_id))
    }

    /// File name of snapshot `index`
    #[must_use]
    pub fn path(&self, index: u32) -> PathBuf {
        let mut name = self.stem.clone().into_os_string();
        name.push(format!("@{index}.zip"));
        PathBuf::from(name)
    }

    #[must_use]
    pub fn exists(&self, index: u32) -> bool {
        self.path(index).is_file()
    }

    /// Evict the oldest snapshot and shift indices `1..max` up by one
    ///
    /// Index 0 is never moved. Failures are logged and skipped.
    pub fn rotate(&self, max_snapshots: i32) {
        let limit = effective_limit(max_snapshots);

        let oldest = self.path(limit);
        if oldest.exists() {
            match clear_readonly(&oldest).and_then(|()| fs::remove_file(&oldest)) {
                Ok(()) => info!("Deleted {}", oldest.display()),
                Err(e) => warn!("Could not delete {}: {e}", oldest.display()),
            }
        }

        for index in (1..limit).rev() {
            let from = self.path(index);
            if !from.exists() {
                continue;
            }
            let to = self.path(index + 1);
            match fs::rename(&from, &to) {
                Ok(()) => info!("Renamed {} to {}", from.display(), to.display()),
                Err(e) => warn!(
                    "Could not rename {} to {}: {e}",
                    from.display(),
                    to.display()
                ),
            }
        }
    }
}
