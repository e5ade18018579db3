//! What is installed now and which archives could replace it

use crate::archive::archive_path;
use crate::host::Host;
use crate::manifest::{Manifest, ManifestError, UNCONFIGURED_ARCHIVE};
use crate::settings::Settings;
use crate::snapshot::SnapshotSet;
use crate::util::has_zip_suffix;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors while scanning the base directory
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read base directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An archive in the base directory together with the manifest inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub manifest: Manifest,
    /// The archive id matches the current installation's
    pub is_current: bool,
}

impl ArchiveEntry {
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Result of matching a name fragment against the base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentMatch {
    Unique(PathBuf),
    Ambiguous(Vec<PathBuf>),
    /// Nothing matched; carries every candidate file
    NoMatch(Vec<PathBuf>),
}

/// The live configuration, if one exists
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed
pub fn current_installation(settings: &Settings) -> Result<Option<Manifest>, ManifestError> {
    Manifest::from_file(&settings.installation_file)
}

/// An installation present on disk but never configured
///
/// Loads the template from the base directory under a placeholder identity
/// and keeps it only if every one of its resources exists.
///
/// # Errors
/// Returns an error if the template exists but cannot be read or parsed
pub fn probe_unconfigured(settings: &Settings, host: &Host) -> Result<Option<Manifest>, ManifestError> {
    let dir = settings
        .installation_file
        .parent()
        .unwrap_or_else(|| Path::new(""));
    let name = format!("Installation at '{}'", dir.display());

    let probed = Manifest::from_default(&settings.base_directory, &name, UNCONFIGURED_ARCHIVE)?;
    Ok(probed.filter(|manifest| {
        let present = manifest.exists(host);
        debug!("unconfigured installation present: {present}");
        present
    }))
}

/// All plain files directly in `base_dir`, sorted by name
fn files_in(base_dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let entries = match fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(CatalogError::Io {
                path: base_dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    Ok(files)
}

/// Every readable archive in `base_dir`, sorted by file name
///
/// Archives without a manifest or that fail to open are logged and skipped.
///
/// # Errors
/// Returns an error if the base directory exists but cannot be read
pub fn list_archives(
    base_dir: &Path,
    current: Option<&Manifest>,
) -> Result<Vec<ArchiveEntry>, CatalogError> {
    let mut archives = Vec::new();

    for path in files_in(base_dir)? {
        if !has_zip_suffix(&path.to_string_lossy()) {
            continue;
        }
        match Manifest::from_archive(&path) {
            Ok(Some(manifest)) => {
                let is_current =
                    current.is_some_and(|c| c.archive.eq_ignore_ascii_case(&manifest.archive));
                archives.push(ArchiveEntry {
                    path,
                    manifest,
                    is_current,
                });
            }
            Ok(None) => warn!("{} contains no manifest, skipped", path.display()),
            Err(e) => warn!("Cannot read {}: {e}", path.display()),
        }
    }

    Ok(archives)
}

/// Files in `base_dir` whose name contains `fragment`, ignoring case
///
/// # Errors
/// Returns an error if the base directory exists but cannot be read
pub fn find_by_fragment(base_dir: &Path, fragment: &str) -> Result<FragmentMatch, CatalogError> {
    let files = files_in(base_dir)?;
    let needle = fragment.to_lowercase();

    let mut matches: Vec<PathBuf> = files
        .iter()
        .filter(|path| {
            path.file_name()
                .is_some_and(|n| n.to_string_lossy().to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();

    Ok(match matches.len() {
        0 => FragmentMatch::NoMatch(files),
        1 => FragmentMatch::Unique(matches.remove(0)),
        _ => FragmentMatch::Ambiguous(matches),
    })
}

/// The snapshot file `index` of `manifest`, if it exists
#[must_use]
pub fn snapshot_file(base_dir: &Path, manifest: &Manifest, index: u32) -> Option<PathBuf> {
    let snapshots = SnapshotSet::for_archive(&archive_path(base_dir, &manifest.archive));
    snapshots.exists(index).then(|| snapshots.path(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveWriter;
    use crate::item::{ExclusionRules, FileTree};
    use crate::manifest::MANIFEST_FILE_NAME;
    use crate::registry::MemoryRegistry;
    use tempfile::TempDir;

    fn write_archive(base: &Path, file: &str, manifest: &Manifest) {
        let mut writer = ArchiveWriter::create(&base.join(file)).unwrap();
        writer
            .add_text(MANIFEST_FILE_NAME, &manifest.to_xml().unwrap())
            .unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_find_by_fragment() {
        let temp = TempDir::new().unwrap();
        for name in ["PROAKT_MAIN.zip", "PROAKT_MAIN@0.zip", "PROAKT_HOTFIX.zip"] {
            fs::write(temp.path().join(name), "").unwrap();
        }

        assert_eq!(
            find_by_fragment(temp.path(), "hotfix").unwrap(),
            FragmentMatch::Unique(temp.path().join("PROAKT_HOTFIX.zip"))
        );
        assert!(matches!(
            find_by_fragment(temp.path(), "main").unwrap(),
            FragmentMatch::Ambiguous(paths) if paths.len() == 2
        ));
        assert!(matches!(
            find_by_fragment(temp.path(), "nothing").unwrap(),
            FragmentMatch::NoMatch(paths) if paths.len() == 3
        ));
    }

    #[test]
    fn test_list_archives_marks_current() {
        let temp = TempDir::new().unwrap();
        let main = Manifest::new("Main", "PROAKT_MAIN");
        write_archive(temp.path(), "PROAKT_MAIN.zip", &main);
        write_archive(temp.path(), "PROAKT_B.zip", &Manifest::new("B", "PROAKT_B"));
        fs::write(temp.path().join("broken.zip"), "not a zip").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();

        let current = Manifest::new("Main", "proakt_main");
        let archives = list_archives(temp.path(), Some(&current)).unwrap();

        assert_eq!(archives.len(), 2);
        assert_eq!(archives[0].file_name(), "PROAKT_B.zip");
        assert!(!archives[0].is_current);
        assert_eq!(archives[1].manifest, main);
        assert!(archives[1].is_current);
    }

    #[test]
    fn test_list_archives_of_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert!(list_archives(&temp.path().join("absent"), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_probe_unconfigured() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let installed = temp.path().join("installed");
        fs::create_dir_all(&base).unwrap();

        let mut template = Manifest::new("Template", UNCONFIGURED_ARCHIVE);
        template
            .items
            .push(FileTree::new(installed.to_string_lossy(), "files").into());
        template.write_to(&base.join(MANIFEST_FILE_NAME)).unwrap();

        let settings = Settings::with_base_directory(&base);
        let host = Host::system(ExclusionRules::default()).with_registry(MemoryRegistry::new());

        assert!(probe_unconfigured(&settings, &host).unwrap().is_none());

        fs::create_dir_all(&installed).unwrap();
        let probed = probe_unconfigured(&settings, &host).unwrap().unwrap();
        assert!(!probed.is_configured());
        assert!(probed.name.starts_with("Installation at '"));
    }

    #[test]
    fn test_snapshot_file() {
        let temp = TempDir::new().unwrap();
        let manifest = Manifest::new("Main", "PROAKT_MAIN");
        fs::write(temp.path().join("PROAKT_MAIN@2.zip"), "").unwrap();

        assert_eq!(
            snapshot_file(temp.path(), &manifest, 2),
            Some(temp.path().join("PROAKT_MAIN@2.zip"))
        );
        assert_eq!(snapshot_file(temp.path(), &manifest, 0), None);
    }
}
