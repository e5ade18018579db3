//! Registry subtrees

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::host::Host;
use crate::registry::regfile::{self, ExportOptions};
use crate::registry::WriteOptions;
use crate::util::entry_name;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;
use tracing::{debug, info, warn};

pub(crate) const TAG: &str = "registry";

/// A registry key and everything below it, stored as one REGEDIT4 entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryItem {
    pub key: String,
    pub archive: String,
}

impl RegistryItem {
    #[must_use]
    pub fn new(key: impl Into<String>, archive: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            archive: archive.into(),
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        format!("Registry {}", self.key)
    }

    #[must_use]
    pub fn exists(&self, host: &Host) -> bool {
        match host.registry().import(&self.key) {
            Ok(entry) => entry.is_some(),
            Err(e) => {
                warn!("Cannot read {}: {e}", self.key);
                false
            }
        }
    }

    pub fn backup(&self, archive: &mut ArchiveWriter, host: &Host) -> bool {
        let entry = match host.registry().import(&self.key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                warn!("Registry key {} does not exist, nothing to back up", self.key);
                return false;
            }
            Err(e) => {
                warn!("Cannot read {}: {e}", self.key);
                return false;
            }
        };

        let blob = regfile::export(&entry, ExportOptions { no_empty_keys: true });
        match archive.add_text(&entry_name(&self.archive), &blob) {
            Ok(()) => {
                debug!("exported {} keys below {}", entry.key_count(), self.key);
                true
            }
            Err(e) => {
                warn!("Failed to archive {}: {e}", self.key);
                false
            }
        }
    }

    pub fn restore(&self, archive: &mut ArchiveReader, host: &Host) -> bool {
        let name = entry_name(&self.archive);
        let blob = match archive.read_to_string(&name) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Cannot restore {}: {e}", self.key);
                return false;
            }
        };

        let entry = match regfile::import(&blob) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Entry {name} is not a registry export: {e}");
                return false;
            }
        };

        match host
            .registry()
            .write(&entry, WriteOptions::shared_recursive())
        {
            Ok(()) => {
                info!("Restored {}", entry.path());
                true
            }
            Err(e) => {
                warn!("Failed to write {}: {e}", entry.path());
                false
            }
        }
    }

    pub fn uninstall(&self, host: &Host) -> bool {
        match host.registry().delete_tree(&self.key) {
            Ok(()) => {
                info!("Deleted {}", self.key);
                true
            }
            Err(e) => {
                warn!("Failed to delete {}: {e}", self.key);
                false
            }
        }
    }

    pub(crate) fn write_element<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let element = BytesStart::new(TAG).with_attributes([
            ("key", self.key.as_str()),
            ("archive", self.archive.as_str()),
        ]);
        writer.write_event(Event::Empty(element))
    }
}
