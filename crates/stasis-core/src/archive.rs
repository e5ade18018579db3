//! Zip containers holding a manifest and the payload of each resource item

use crate::util::{clear_readonly, has_zip_suffix};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Errors while creating or reading an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive entry not found: {0}")]
    MissingEntry(String),

    #[error("Archive entry '{0}' is not valid UTF-8")]
    NotText(String),
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The archive file for `archive_id` in `base_dir`, with `.zip` enforced
#[must_use]
pub fn archive_path(base_dir: &Path, archive_id: &str) -> PathBuf {
    if has_zip_suffix(archive_id) {
        base_dir.join(archive_id)
    } else {
        base_dir.join(format!("{archive_id}.zip"))
    }
}

fn best_compression() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
}

/// An archive opened for writing
///
/// Call [`finish`](Self::finish) to write the central directory and see
/// any error. A writer dropped without `finish` is still finalized by the
/// underlying `ZipWriter`, with errors ignored.
pub struct ArchiveWriter {
    path: PathBuf,
    zip: ZipWriter<File>,
}

impl ArchiveWriter {
    /// Create (or truncate) the archive at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        if path.exists() {
            clear_readonly(path).map_err(|e| ArchiveError::io(path, e))?;
        }
        let file = File::create(path).map_err(|e| ArchiveError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            zip: ZipWriter::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add an in-memory text blob as entry `name`
    ///
    /// # Errors
    /// Returns an error if the entry cannot be written
    pub fn add_text(&mut self, name: &str, text: &str) -> Result<(), ArchiveError> {
        self.zip.start_file(name, best_compression())?;
        self.zip
            .write_all(text.as_bytes())
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        Ok(())
    }

    /// Add the file at `source` as entry `name`
    ///
    /// # Errors
    /// Returns an error if the source cannot be read or the entry cannot be written
    pub fn add_file(&mut self, name: &str, source: &Path) -> Result<(), ArchiveError> {
        let mut input = File::open(source).map_err(|e| ArchiveError::io(source, e))?;
        self.zip.start_file(name, best_compression())?;
        io::copy(&mut input, &mut self.zip).map_err(|e| ArchiveError::io(source, e))?;
        debug!("archived {} as {name}", source.display());
        Ok(())
    }

    /// Write the central directory and close the file
    ///
    /// # Errors
    /// Returns an error if the archive cannot be finalized
    pub fn finish(mut self) -> Result<PathBuf, ArchiveError> {
        let mut file = self.zip.finish()?;
        file.flush().map_err(|e| ArchiveError::io(&self.path, e))?;
        Ok(self.path)
    }
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// An archive opened read-only
pub struct ArchiveReader {
    path: PathBuf,
    zip: ZipArchive<File>,
}

impl ArchiveReader {
    /// Open the archive at `path`
    ///
    /// # Errors
    /// Returns an error if the file is missing or not a zip archive
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            zip: ZipArchive::new(file)?,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all file entries, directories excluded, in archive order
    ///
    /// # Errors
    /// Returns an error if the central directory is corrupt
    pub fn entries(&mut self) -> Result<Vec<String>, ArchiveError> {
        let mut names = Vec::with_capacity(self.zip.len());
        for index in 0..self.zip.len() {
            let entry = self.zip.by_index(index)?;
            if !entry.is_dir() {
                names.push(entry.name().to_string());
            }
        }
        Ok(names)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.zip.file_names().any(|n| n == name)
    }

    /// Read entry `name` as UTF-8 text
    ///
    /// # Errors
    /// Returns an error if the entry is missing or not valid UTF-8
    pub fn read_to_string(&mut self, name: &str) -> Result<String, ArchiveError> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ArchiveError::MissingEntry(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::NotText(name.to_string()))
    }

    /// Extract entry `name` to `target`, overwriting any existing file
    ///
    /// The parent directory of `target` must already exist.
    ///
    /// # Errors
    /// Returns an error if the entry is missing or the target cannot be written
    pub fn extract(&mut self, name: &str, target: &Path) -> Result<(), ArchiveError> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ArchiveError::MissingEntry(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if target.exists() {
            clear_readonly(target).map_err(|e| ArchiveError::io(target, e))?;
        }
        let mut output = File::create(target).map_err(|e| ArchiveError::io(target, e))?;
        io::copy(&mut entry, &mut output).map_err(|e| ArchiveError::io(target, e))?;
        debug!("extracted {name} to {}", target.display());
        Ok(())
    }
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("path", &self.path)
            .field("entries", &self.zip.len())
            .finish()
    }
}

/// Delete an archive file, clearing a read-only flag first
///
/// # Errors
/// Returns an error if the file exists and cannot be removed
pub fn remove_archive(path: &Path) -> io::Result<()> {
    match clear_readonly(path) {
        Ok(()) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
