//! Directory trees

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::host::Host;
use crate::manifest::MANIFEST_FILE_NAME;
use crate::util::{clear_readonly, entry_name, entry_target, expand_env_vars, join_entry};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub(crate) const TAG: &str = "files";

/// A directory tree stored under one archive sub-path
///
/// `folder` may contain `%VAR%` references. They are expanded whenever the
/// tree is touched and kept verbatim in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTree {
    pub folder: String,
    pub archive: String,
}

/// The part of `name` below `prefix`, split on a component boundary
fn below_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(name);
    }
    name.strip_prefix(prefix)?.strip_prefix('/')
}

impl FileTree {
    #[must_use]
    pub fn new(folder: impl Into<String>, archive: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            archive: archive.into(),
        }
    }

    /// The source directory with environment references expanded
    #[must_use]
    pub fn source(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.folder))
    }

    fn prefix(&self) -> String {
        entry_name(&self.archive)
    }

    #[must_use]
    pub fn describe(&self) -> String {
        format!("Files {}", self.folder)
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.source().is_dir()
    }

    /// Archive every file below the source directory that the host's
    /// exclusion rules let through
    pub fn backup(&self, archive: &mut ArchiveWriter, host: &Host) -> bool {
        let root = self.source();
        if !root.is_dir() {
            warn!("Folder {} does not exist, nothing to back up", root.display());
            return false;
        }

        let exclusions = host.exclusions().compile();
        let prefix = self.prefix();
        let mut success = true;

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read below {}: {e}", root.display());
                    success = false;
                    continue;
                }
            };

            // Symlinks are never followed or archived
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if exclusions.excludes(path) {
                debug!("skipping {}", path.display());
                continue;
            }

            let Ok(relative) = path.strip_prefix(&root) else {
                continue;
            };
            let name = join_entry(&prefix, relative);
            if let Err(e) = archive.add_file(&name, path) {
                warn!("Failed to archive {}: {e}", path.display());
                success = false;
            }
        }

        success
    }

    /// Extract every archive entry below the item's sub-path into the source
    /// directory, overwriting existing files
    pub fn restore(&self, archive: &mut ArchiveReader, host: &Host) -> bool {
        let root = self.source();
        let prefix = self.prefix();

        let entries = match archive.entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {e}", archive.path().display());
                return false;
            }
        };

        let mut prepared: HashSet<PathBuf> = HashSet::new();
        let mut success = true;

        for name in entries {
            if prefix.is_empty() && name == MANIFEST_FILE_NAME {
                continue;
            }
            let Some(relative) = below_prefix(&name, &prefix) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }

            let target = match entry_target(&root, relative) {
                Ok(target) => target,
                Err(e) => {
                    warn!("Refusing to extract: {e}");
                    success = false;
                    continue;
                }
            };

            let Some(dir) = target.parent() else {
                continue;
            };
            if !prepared.contains(dir) {
                if let Err(e) = host.access().create_shared(dir) {
                    warn!("Cannot create {}: {e}", dir.display());
                    success = false;
                    continue;
                }
                prepared.insert(dir.to_path_buf());
            }

            if let Err(e) = archive.extract(&name, &target) {
                warn!("Failed to extract {name}: {e}");
                success = false;
            }
        }

        success
    }

    /// Delete the whole source tree, attempting every file even after failures
    pub fn uninstall(&self) -> bool {
        let root = self.source();
        if !root.exists() {
            debug!("{} is already gone", root.display());
            return true;
        }
        remove_tree(&root)
    }

    pub(crate) fn write_element<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let element = BytesStart::new(TAG).with_attributes([
            ("folder", self.folder.as_str()),
            ("archive", self.archive.as_str()),
        ]);
        writer.write_event(Event::Empty(element))
    }
}

fn remove_entry(path: &Path, remove: fn(&Path) -> std::io::Result<()>) -> bool {
    match clear_readonly(path).and_then(|()| remove(path)) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to delete {}: {e}", path.display());
            false
        }
    }
}

fn remove_tree(dir: &Path) -> bool {
    let mut success = true;

    // A read-only directory keeps its children from being unlinked
    if let Err(e) = clear_readonly(dir) {
        debug!("Cannot make {} writable: {e}", dir.display());
    }

    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Cannot read {}: {e}", dir.display());
                        success = false;
                        continue;
                    }
                };
                let path = entry.path();
                let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
                let removed = if is_dir {
                    remove_tree(&path)
                } else {
                    remove_entry(&path, |p| fs::remove_file(p))
                };
                success &= removed;
            }
        }
        Err(e) => {
            warn!("Cannot read {}: {e}", dir.display());
            success = false;
        }
    }

    success &= remove_entry(dir, |p| fs::remove_dir(p));
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ExclusionRules;
    use tempfile::TempDir;

    fn host() -> Host {
        Host::system(ExclusionRules::default())
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_below_prefix_respects_component_boundary() {
        assert_eq!(below_prefix("files/a.txt", "files"), Some("a.txt"));
        assert_eq!(below_prefix("files2/a.txt", "files"), None);
        assert_eq!(below_prefix("a.txt", ""), Some("a.txt"));
    }

    #[test]
    fn test_backup_applies_exclusions() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app");
        write(&source.join("data.txt"), "data");
        write(&source.join("app.log"), "log");
        write(&source.join("cache.mem"), "mem");
        write(&source.join("installation.xml"), "<installation/>");
        write(&source.join("conf/server.ini"), "ini");

        let tree = FileTree::new(source.to_string_lossy(), "files\\app");
        let path = temp.path().join("out.zip");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        assert!(tree.backup(&mut writer, &host()));
        writer.finish().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(
            reader.entries().unwrap(),
            vec!["files/app/conf/server.ini", "files/app/data.txt"]
        );
    }

    #[test]
    fn test_backup_of_missing_folder_fails() {
        let temp = TempDir::new().unwrap();
        let tree = FileTree::new(temp.path().join("absent").to_string_lossy(), "files");
        let mut writer = ArchiveWriter::create(&temp.path().join("out.zip")).unwrap();
        assert!(!tree.backup(&mut writer, &host()));
    }

    #[test]
    fn test_restore_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app");
        write(&source.join("a/b/c.txt"), "deep");
        write(&source.join("top.txt"), "top");

        let tree = FileTree::new(source.to_string_lossy(), "files");
        let path = temp.path().join("out.zip");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        assert!(tree.backup(&mut writer, &host()));
        writer.finish().unwrap();

        assert!(tree.uninstall());
        assert!(!source.exists());

        for _ in 0..2 {
            let mut reader = ArchiveReader::open(&path).unwrap();
            assert!(tree.restore(&mut reader, &host()));
            assert_eq!(fs::read_to_string(source.join("a/b/c.txt")).unwrap(), "deep");
            assert_eq!(fs::read_to_string(source.join("top.txt")).unwrap(), "top");
        }
    }

    #[test]
    fn test_restore_rejects_escaping_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("evil.zip");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        writer.add_text("files/../../escape.txt", "x").unwrap();
        writer.add_text("files/ok.txt", "ok").unwrap();
        writer.finish().unwrap();

        let source = temp.path().join("target");
        let tree = FileTree::new(source.to_string_lossy(), "files");
        let mut reader = ArchiveReader::open(&path).unwrap();

        assert!(!tree.restore(&mut reader, &host()));
        assert!(source.join("ok.txt").exists());
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn test_uninstall_clears_readonly_files() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app");
        let file = source.join("sub/locked.txt");
        write(&file, "locked");
        let mut permissions = fs::metadata(&file).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&file, permissions).unwrap();

        let tree = FileTree::new(source.to_string_lossy(), "files");
        assert!(tree.uninstall());
        assert!(!source.exists());
        assert!(!tree.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_uninstall_clears_readonly_directories() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app");
        write(&source.join("conf/deep/a.txt"), "a");
        write(&source.join("conf/b.txt"), "b");
        for dir in [source.join("conf/deep"), source.join("conf")] {
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();
        }

        let tree = FileTree::new(source.to_string_lossy(), "files");
        assert!(tree.uninstall());
        assert!(!source.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_uninstall_attempts_everything_after_a_failure() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let source = temp.path().join("app");
        write(&source.join("locked/inner.txt"), "inner");
        write(&source.join("z.txt"), "z");
        let locked = source.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through any mode bits
        if fs::read_dir(&locked).is_ok() {
            return;
        }

        let tree = FileTree::new(source.to_string_lossy(), "files");
        assert!(!tree.uninstall());
        assert!(!source.join("z.txt").exists());
        assert!(locked.exists());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_uninstall_of_missing_folder_succeeds() {
        let temp = TempDir::new().unwrap();
        let tree = FileTree::new(temp.path().join("absent").to_string_lossy(), "files");
        assert!(tree.uninstall());
    }
}
