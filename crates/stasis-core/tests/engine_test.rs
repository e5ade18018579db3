//! Backup, restore, and uninstall passes over real temp directories

use stasis_core::archive::ArchiveReader;
use stasis_core::backup::{self, BackupMode};
use stasis_core::hook::{ProcessControl, Termination};
use stasis_core::host::Silent;
use stasis_core::item::{ExclusionRules, FileTree, RegistryItem};
use stasis_core::registry::{MemoryRegistry, RegKeyEntry, RegValue, Registry, WriteOptions};
use stasis_core::snapshot::SnapshotSet;
use stasis_core::{Host, LifecycleHook, Manifest};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Relative path -> content for every file below `dir`
fn snapshot_directory(dir: &Path) -> BTreeMap<String, String> {
    fn visit(dir: &Path, base: &Path, out: &mut BTreeMap<String, String>) {
        for entry in fs::read_dir(dir).unwrap().filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                visit(&path, base, out);
            } else {
                let relative = path
                    .strip_prefix(base)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                out.insert(relative, fs::read_to_string(&path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    visit(dir, dir, &mut out);
    out
}

fn host() -> Host {
    Host::system(ExclusionRules::default()).with_registry(MemoryRegistry::new())
}

fn file_manifest(source: &Path) -> Manifest {
    let mut manifest = Manifest::new("Test", "PROAKT_TEST");
    manifest
        .items
        .push(FileTree::new(source.to_string_lossy(), "files").into());
    manifest
}

#[test]
fn test_backup_uninstall_restore_end_to_end() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base");
    let source = temp.path().join("app");
    let live = temp.path().join("live").join("installation.xml");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("a.txt"), "alpha").unwrap();
    fs::write(source.join("b.txt"), "beta").unwrap();
    fs::write(source.join("x.log"), "noise").unwrap();

    let manifest = file_manifest(&source);
    let host = host();

    let mut lines = Vec::new();
    let report = backup::backup(
        &manifest,
        &base,
        BackupMode::Archive,
        &host,
        &mut |line: &str| lines.push(line.to_string()),
    )
    .unwrap();
    assert!(report.is_success());

    let archive = base.join("PROAKT_TEST.zip");
    assert_eq!(report.archive.as_deref(), Some(archive.as_path()));
    assert!(lines[0].starts_with("Creating '"));
    assert_eq!(lines.last().map(String::as_str), Some("Done."));

    let entries = ArchiveReader::open(&archive).unwrap().entries().unwrap();
    assert_eq!(entries, vec!["installation.xml", "files/a.txt", "files/b.txt"]);

    assert!(manifest.exists(&host));
    assert!(backup::uninstall(&manifest, &host, &mut Silent).is_success());
    assert!(!source.exists());
    assert!(!manifest.exists(&host));

    let report = backup::restore(&manifest, &base, &live, &host, &mut Silent).unwrap();
    assert!(report.is_success());

    let restored = snapshot_directory(&source);
    assert_eq!(
        restored.into_iter().collect::<Vec<_>>(),
        vec![
            ("a.txt".to_string(), "alpha".to_string()),
            ("b.txt".to_string(), "beta".to_string()),
        ]
    );
    assert_eq!(Manifest::from_file(&live).unwrap().unwrap(), manifest);
}

#[test]
fn test_restore_is_reentrant() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base");
    let source = temp.path().join("app");
    let live = temp.path().join("installation.xml");
    fs::create_dir_all(source.join("conf/deep")).unwrap();
    fs::write(source.join("conf/deep/server.ini"), "port=80").unwrap();
    fs::write(source.join("readme.txt"), "hello").unwrap();

    let manifest = file_manifest(&source);
    let host = host();
    backup::backup(&manifest, &base, BackupMode::Archive, &host, &mut Silent).unwrap();
    let before = snapshot_directory(&source);

    for _ in 0..2 {
        let report = backup::restore(&manifest, &base, &live, &host, &mut Silent).unwrap();
        assert!(report.is_success());
        assert_eq!(snapshot_directory(&source), before);
    }
}

#[test]
fn test_exclusion_set() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base");
    let source = temp.path().join("app");
    fs::create_dir_all(&source).unwrap();
    for name in ["app.log", "cache.mem", "installation.xml", "data.txt"] {
        fs::write(source.join(name), name).unwrap();
    }

    let manifest = file_manifest(&source);
    let report =
        backup::backup(&manifest, &base, BackupMode::Archive, &host(), &mut Silent).unwrap();

    let entries = ArchiveReader::open(report.archive.as_deref().unwrap())
        .unwrap()
        .entries()
        .unwrap();
    assert_eq!(entries, vec!["installation.xml", "files/data.txt"]);
}

#[test]
fn test_partial_failure_is_reported() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base");
    let present = temp.path().join("present");
    fs::create_dir_all(&present).unwrap();
    fs::write(present.join("ok.txt"), "ok").unwrap();

    let mut manifest = file_manifest(&temp.path().join("missing"));
    manifest
        .items
        .push(FileTree::new(present.to_string_lossy(), "present").into());

    let report =
        backup::backup(&manifest, &base, BackupMode::Archive, &host(), &mut Silent).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    // Later items still ran
    let entries = ArchiveReader::open(report.archive.as_deref().unwrap())
        .unwrap()
        .entries()
        .unwrap();
    assert!(entries.contains(&"present/ok.txt".to_string()));
}

#[test]
fn test_restore_continues_past_a_failed_item() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base");
    let source = temp.path().join("app");
    let live = temp.path().join("live").join("installation.xml");
    fs::create_dir_all(source.join("conf")).unwrap();
    fs::write(source.join("a.txt"), "alpha").unwrap();
    fs::write(source.join("conf").join("b.txt"), "beta").unwrap();

    let host = host();
    let report = backup::backup(
        &file_manifest(&source),
        &base,
        BackupMode::Archive,
        &host,
        &mut Silent,
    )
    .unwrap();
    let archive = report.archive.unwrap();
    fs::remove_dir_all(&source).unwrap();

    // The registry blob was never archived
    let mut manifest = Manifest::new("Test", "PROAKT_TEST");
    manifest
        .items
        .push(RegistryItem::new("HKLM\\Software\\Missing", "registry/missing.reg").into());
    manifest
        .items
        .push(FileTree::new(source.to_string_lossy(), "files").into());

    let report = backup::restore_from(&manifest, &archive, &live, &host, &mut Silent).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed, vec!["Registry HKLM\\Software\\Missing".to_string()]);
    assert_eq!(
        snapshot_directory(&source),
        BTreeMap::from([
            ("a.txt".to_string(), "alpha".to_string()),
            ("conf/b.txt".to_string(), "beta".to_string()),
        ])
    );
    let written = Manifest::from_file(&live).unwrap().unwrap();
    assert_eq!(written, manifest);
}

#[test]
fn test_uninstall_continues_past_a_failed_item() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("keep");
    fs::create_dir_all(source.join("sub")).unwrap();
    fs::write(source.join("sub").join("x.txt"), "x").unwrap();

    let mut manifest = Manifest::new("Test", "PROAKT_TEST");
    manifest
        .items
        .push(RegistryItem::new("HKEY_NOWHERE\\x", "registry/x.reg").into());
    manifest
        .items
        .push(FileTree::new(source.to_string_lossy(), "files").into());

    let mut lines = Vec::new();
    let report = backup::uninstall(&manifest, &host(), &mut |line: &str| {
        lines.push(line.to_string());
    });

    assert!(!report.is_success());
    assert_eq!(report.failed, vec!["Registry HKEY_NOWHERE\\x".to_string()]);
    assert!(!source.exists());
    assert_eq!(lines.last().map(String::as_str), Some("Done."));
}

#[test]
fn test_snapshot_backups_rotate() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base");
    let source = temp.path().join("app");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("v.txt"), "1").unwrap();

    let manifest = file_manifest(&source);
    let host = host();
    let mode = BackupMode::Snapshot { max_snapshots: 3 };

    let report = backup::backup(&manifest, &base, mode, &host, &mut Silent).unwrap();
    let snapshots = SnapshotSet::new(&base, &manifest.archive);
    assert_eq!(report.archive, Some(snapshots.path(0)));
    assert!(snapshots.exists(0));

    // Shift a snapshot up by hand, then take another one
    fs::rename(snapshots.path(0), snapshots.path(1)).unwrap();
    backup::backup(&manifest, &base, mode, &host, &mut Silent).unwrap();

    assert!(snapshots.exists(0));
    assert!(!snapshots.exists(1));
    assert!(snapshots.exists(2));
    assert!(!base.join("PROAKT_TEST.zip").exists());
}

#[test]
fn test_restore_from_missing_archive_is_fatal() {
    let temp = TempDir::new().unwrap();
    let manifest = file_manifest(&temp.path().join("app"));
    let live = temp.path().join("installation.xml");

    let result = backup::restore(&manifest, temp.path(), &live, &host(), &mut Silent);
    assert!(result.is_err());
    assert!(!live.exists());
}

#[test]
fn test_registry_round_trip() {
    let temp = TempDir::new().unwrap();
    let registry = MemoryRegistry::new();
    let mut key = RegKeyEntry::new("HKEY_LOCAL_MACHINE\\Software\\Vendor");
    key.set_value("InstallDir", RegValue::String("C:\\Vendor".into()));
    key.descend_mut("Modules\\Core")
        .set_value("Enabled", RegValue::Dword(1));
    registry
        .write(&key, WriteOptions::shared_recursive())
        .unwrap();
    let host = Host::system(ExclusionRules::default()).with_registry(registry);

    let mut manifest = Manifest::new("Reg", "PROAKT_REG");
    manifest
        .items
        .push(RegistryItem::new("HKLM\\Software\\Vendor", "registry\\vendor.reg").into());

    let base = temp.path().join("base");
    let live = temp.path().join("installation.xml");
    assert!(
        backup::backup(&manifest, &base, BackupMode::Archive, &host, &mut Silent)
            .unwrap()
            .is_success()
    );
    assert!(backup::uninstall(&manifest, &host, &mut Silent).is_success());
    assert!(host
        .registry()
        .import("HKLM\\Software\\Vendor")
        .unwrap()
        .is_none());

    assert!(backup::restore(&manifest, &base, &live, &host, &mut Silent)
        .unwrap()
        .is_success());
    let restored = host
        .registry()
        .import("HKLM\\Software\\Vendor")
        .unwrap()
        .unwrap();
    assert_eq!(
        restored.value("InstallDir"),
        Some(&RegValue::String("C:\\Vendor".into()))
    );
    assert_eq!(
        restored
            .key("Modules")
            .and_then(|m| m.key("Core"))
            .and_then(|c| c.value("Enabled")),
        Some(&RegValue::Dword(1))
    );
}

/// Records hook calls and item removal order through one shared log
#[derive(Clone, Default)]
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl ProcessControl for Recorder {
    fn run_and_wait(&self, program: &str) -> io::Result<Option<i32>> {
        self.log.lock().unwrap().push(format!("run {program}"));
        Ok(Some(0))
    }

    fn terminate_by_name(&self, name: &str) -> Vec<Termination> {
        self.log.lock().unwrap().push(format!("kill {name}"));
        Vec::new()
    }
}

#[test]
fn test_shutdown_hooks_run_first_and_in_order() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("app");
    fs::create_dir_all(&source).unwrap();

    let recorder = Recorder::default();
    let host = host().with_processes(recorder.clone());

    let mut manifest = file_manifest(&source);
    manifest.shutdown = vec![
        LifecycleHook::Kill {
            process_name: "server".into(),
        },
        LifecycleHook::RunSync {
            file: "cleanup".into(),
        },
    ];
    manifest.startup = vec![LifecycleHook::RunSync {
        file: "start".into(),
    }];

    let log = recorder.log.clone();
    let mut progress = |line: &str| log.lock().unwrap().push(format!("item {line}"));
    backup::uninstall(&manifest, &host, &mut progress);

    let calls = recorder.log.lock().unwrap().clone();
    assert_eq!(calls[0], "kill server");
    assert_eq!(calls[1], "run cleanup");
    assert!(calls[2].starts_with("item Files "));
    // Startup hooks are never run by the engines
    assert!(!calls.iter().any(|c| c == "run start"));
}

#[test]
fn test_backup_embeds_manifest() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("app");
    fs::create_dir_all(&source).unwrap();
    let manifest = file_manifest(&source);

    let report = backup::backup(
        &manifest,
        &temp.path().join("base"),
        BackupMode::Archive,
        &host(),
        &mut Silent,
    )
    .unwrap();

    let embedded = Manifest::from_archive(report.archive.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(embedded, manifest);
}
