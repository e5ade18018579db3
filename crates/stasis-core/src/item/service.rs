//! Network service placeholder

use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;
use tracing::debug;

pub(crate) const TAG: &str = "tcpip-service";

/// A declared TCP/IP service
///
/// Services are carried through the manifest but not backed up: every
/// operation succeeds without touching the machine. `port` keeps the raw
/// attribute text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkService {
    pub name: String,
    pub port: String,
}

impl NetworkService {
    #[must_use]
    pub fn new(name: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        format!("Service {} (port {})", self.name, self.port)
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        true
    }

    pub fn backup(&self) -> bool {
        debug!("service {} is not backed up", self.name);
        true
    }

    pub fn restore(&self) -> bool {
        debug!("service {} is not restored", self.name);
        true
    }

    pub fn uninstall(&self) -> bool {
        debug!("service {} is not uninstalled", self.name);
        true
    }

    pub(crate) fn write_element<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let element = BytesStart::new(TAG)
            .with_attributes([("name", self.name.as_str()), ("port", self.port.as_str())]);
        writer.write_event(Event::Empty(element))
    }
}
