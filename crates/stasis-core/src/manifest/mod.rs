//! The installation manifest
//!
//! A manifest names an installation, lists the resources that make it up,
//! and the hooks to run around them. It lives on disk as `installation.xml`
//! (the live configuration, a bundled template, or the first entry of every
//! archive).

mod parse;
mod write;

use crate::archive::{ArchiveError, ArchiveReader};
use crate::hook::{self, LifecycleHook};
use crate::host::Host;
use crate::item::ResourceItem;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the manifest, on disk and inside archives
pub const MANIFEST_FILE_NAME: &str = "installation.xml";

/// Archive id of a template that has not been named yet
pub const UNCONFIGURED_ARCHIVE: &str = "UNKNOWN";

/// Prefix every archive id created from a display name carries
pub const ARCHIVE_PREFIX: &str = "PROAKT_";

/// Errors while loading or saving a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed XML in {source_name}: {error}")]
    Xml {
        source_name: String,
        #[source]
        error: quick_xml::Error,
    },

    #[error("{0} has no <installation> element")]
    MissingRoot(String),

    #[error("{0}: <installation> has no archive attribute")]
    MissingArchive(String),

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] quick_xml::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// An installation: identity, resource items, and lifecycle hooks
///
/// Item and hook order is significant and survives a round trip through
/// [`to_xml`](Self::to_xml) and [`parse`](Self::parse).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Free-form identity name
    pub name: String,
    /// Archive id; archive files are named after it
    pub archive: String,
    pub items: Vec<ResourceItem>,
    pub startup: Vec<LifecycleHook>,
    pub shutdown: Vec<LifecycleHook>,
}

fn strip_archive_prefix(value: &str) -> &str {
    match value.get(..ARCHIVE_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(ARCHIVE_PREFIX) => &value[ARCHIVE_PREFIX.len()..],
        _ => value,
    }
}

impl Manifest {
    #[must_use]
    pub fn new(name: impl Into<String>, archive: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            archive: archive.into(),
            items: Vec::new(),
            startup: Vec::new(),
            shutdown: Vec::new(),
        }
    }

    /// Parse a manifest document; `source_name` only appears in messages
    ///
    /// # Errors
    /// Returns an error for malformed XML or a missing/incomplete root element
    pub fn parse(source_name: &str, text: &str) -> Result<Self, ManifestError> {
        parse::parse(source_name, text)
    }

    /// Load the manifest at `path`, or `None` if there is no such file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Option<Self>, ManifestError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::parse(&path.display().to_string(), &text).map(Some)
    }

    /// Load the template in `base_dir` and give it a new identity
    ///
    /// # Errors
    /// Returns an error if the template exists but cannot be read or parsed
    pub fn from_default(
        base_dir: &Path,
        name: &str,
        archive: &str,
    ) -> Result<Option<Self>, ManifestError> {
        Ok(Self::from_file(&base_dir.join(MANIFEST_FILE_NAME))?.map(|mut manifest| {
            manifest.name = name.to_string();
            manifest.archive = archive.to_string();
            manifest
        }))
    }

    /// Read the manifest embedded in an archive, or `None` if it has none
    ///
    /// # Errors
    /// Returns an error if the archive cannot be opened or the manifest is malformed
    pub fn from_archive(path: &Path) -> Result<Option<Self>, ManifestError> {
        let mut archive = ArchiveReader::open(path)?;
        if !archive.contains(MANIFEST_FILE_NAME) {
            return Ok(None);
        }
        let text = archive.read_to_string(MANIFEST_FILE_NAME)?;
        let source_name = format!("{}:{MANIFEST_FILE_NAME}", path.display());
        Self::parse(&source_name, &text).map(Some)
    }

    /// Serialize to a manifest document
    ///
    /// # Errors
    /// Returns an error if XML serialization fails
    pub fn to_xml(&self) -> Result<String, ManifestError> {
        write::to_xml(self)
    }

    /// Overwrite `path` with the serialized manifest, creating parent directories
    ///
    /// # Errors
    /// Returns an error if serialization or the file write fails
    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        let xml = self.to_xml()?;
        let io_error = |source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, xml).map_err(io_error)
    }

    /// False for a template whose archive id is still the unconfigured sentinel
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.archive.eq_ignore_ascii_case(UNCONFIGURED_ARCHIVE)
    }

    /// Archive id for display: prefix dropped, underscores as spaces
    #[must_use]
    pub fn short_name(&self) -> String {
        strip_archive_prefix(&self.archive).replace('_', " ")
    }

    /// Derive the archive id from a display name
    pub fn set_short_name(&mut self, display_name: &str) {
        let stem = strip_archive_prefix(display_name)
            .replace(' ', "_")
            .to_uppercase();
        self.archive = format!("{ARCHIVE_PREFIX}{stem}");
    }

    /// An independent copy with a new identity, for a new installation profile
    #[must_use]
    pub fn seed_profile(&self, name: &str, display_name: &str) -> Self {
        let mut seeded = self.clone();
        seeded.name = name.to_string();
        seeded.set_short_name(display_name);
        seeded
    }

    /// True when every item's resource is present; vacuously true without items
    #[must_use]
    pub fn exists(&self, host: &Host) -> bool {
        self.items.iter().all(|item| item.exists(host))
    }

    /// Run the shutdown hooks in order
    pub fn shutdown(&self, host: &Host) {
        hook::run_all(&self.shutdown, host.processes());
    }

    /// Run the startup hooks in order; the engines never do this themselves
    pub fn startup(&self, host: &Host) {
        hook::run_all(&self.startup, host.processes());
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Installation '{}' ({})", self.name, self.archive)
    }
}
