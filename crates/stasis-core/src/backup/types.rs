//! Engine results and errors

use crate::archive::ArchiveError;
use crate::manifest::ManifestError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal engine errors; per-item failures end up in [`OperationReport`] instead
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Cannot create base directory '{path}': {source}")]
    BaseDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a backup goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupMode {
    /// The named archive `<base>/<archive id>.zip`
    #[default]
    Archive,
    /// Rotate the snapshots, then write snapshot 0
    Snapshot { max_snapshots: i32 },
}

/// Outcome of one engine pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationReport {
    /// Archive written or read, if the pass used one
    pub archive: Option<PathBuf>,
    /// Descriptions of the items that reported failure
    pub failed: Vec<String>,
}

impl OperationReport {
    #[must_use]
    pub fn new(archive: Option<&Path>) -> Self {
        Self {
            archive: archive.map(Path::to_path_buf),
            failed: Vec::new(),
        }
    }

    pub fn record(&mut self, description: String, success: bool) {
        if !success {
            self.failed.push(description);
        }
    }

    /// Logical AND of every item result
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
