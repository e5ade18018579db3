//! Resource items: the units an installation is backed up and restored in
//!
//! Each variant knows how to probe, back up, restore, and remove its own
//! resource. Every operation reports success as a `bool`; failures are
//! logged where they happen and never stop the engine from moving on to the
//! next item.

pub mod files;
pub mod filter;
pub mod registry;
pub mod service;

pub use files::FileTree;
pub use filter::{CompiledExclusions, DeniedSegment, ExclusionRules};
pub use registry::RegistryItem;
pub use service::NetworkService;

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::host::Host;
use quick_xml::Writer;
use std::io::Write;

/// One `<files>`, `<registry>`, or `<tcpip-service>` element of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceItem {
    Files(FileTree),
    Registry(RegistryItem),
    TcpipService(NetworkService),
}

impl ResourceItem {
    /// Element name in the manifest document
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Files(_) => files::TAG,
            Self::Registry(_) => registry::TAG,
            Self::TcpipService(_) => service::TAG,
        }
    }

    /// Progress line reported before the item is processed
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Files(item) => item.describe(),
            Self::Registry(item) => item.describe(),
            Self::TcpipService(item) => item.describe(),
        }
    }

    /// Whether the resource is currently present on this machine
    #[must_use]
    pub fn exists(&self, host: &Host) -> bool {
        match self {
            Self::Files(item) => item.exists(),
            Self::Registry(item) => item.exists(host),
            Self::TcpipService(item) => item.exists(),
        }
    }

    /// Add the resource's payload to `archive`
    pub fn backup(&self, archive: &mut ArchiveWriter, host: &Host) -> bool {
        match self {
            Self::Files(item) => item.backup(archive, host),
            Self::Registry(item) => item.backup(archive, host),
            Self::TcpipService(item) => item.backup(),
        }
    }

    /// Put the resource back from `archive`
    pub fn restore(&self, archive: &mut ArchiveReader, host: &Host) -> bool {
        match self {
            Self::Files(item) => item.restore(archive, host),
            Self::Registry(item) => item.restore(archive, host),
            Self::TcpipService(item) => item.restore(),
        }
    }

    /// Remove the resource from this machine
    pub fn uninstall(&self, host: &Host) -> bool {
        match self {
            Self::Files(item) => item.uninstall(),
            Self::Registry(item) => item.uninstall(host),
            Self::TcpipService(item) => item.uninstall(),
        }
    }

    /// Write this item as its own manifest element
    ///
    /// # Errors
    /// Returns an error if the writer fails
    pub fn write_element<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        match self {
            Self::Files(item) => item.write_element(writer),
            Self::Registry(item) => item.write_element(writer),
            Self::TcpipService(item) => item.write_element(writer),
        }
    }
}

impl From<FileTree> for ResourceItem {
    fn from(item: FileTree) -> Self {
        Self::Files(item)
    }
}

impl From<RegistryItem> for ResourceItem {
    fn from(item: RegistryItem) -> Self {
        Self::Registry(item)
    }
}

impl From<NetworkService> for ResourceItem {
    fn from(item: NetworkService) -> Self {
        Self::TcpipService(item)
    }
}
