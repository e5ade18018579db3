//! Manifest reader
//!
//! A single pass over the XML events. Top-level elements become resource
//! items; `<startup>` and `<shutdown>` switch the reader into a hook mode
//! until their end tag.

use super::{Manifest, ManifestError};
use crate::hook::LifecycleHook;
use crate::item::{FileTree, NetworkService, RegistryItem, ResourceItem};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Options,
    Startup,
    Shutdown,
}

struct Element<'a> {
    source: &'a str,
    tag: String,
    start: &'a BytesStart<'a>,
}

impl Element<'_> {
    fn attribute(&self, name: &str) -> Result<Option<String>, ManifestError> {
        let xml_error = |error: quick_xml::Error| ManifestError::Xml {
            source_name: self.source.to_string(),
            error,
        };
        match self.start.try_get_attribute(name) {
            Ok(Some(attribute)) => attribute
                .unescape_value()
                .map(|value| Some(value.into_owned()))
                .map_err(xml_error),
            Ok(None) => Ok(None),
            Err(e) => Err(xml_error(e.into())),
        }
    }

    /// Required attributes, or `None` after logging which one is missing
    fn required<const N: usize>(
        &self,
        names: [&str; N],
    ) -> Result<Option<[String; N]>, ManifestError> {
        let mut values: [String; N] = std::array::from_fn(|_| String::new());
        for (slot, name) in values.iter_mut().zip(names) {
            match self.attribute(name)? {
                Some(value) => *slot = value,
                None => {
                    warn!(
                        "Error reading {}: <{}> lacks the '{name}' attribute, ignored",
                        self.source, self.tag
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(values))
    }

    fn unsupported(&self) {
        warn!(
            "Error reading {}: '{}' is not a supported tag",
            self.source, self.tag
        );
    }
}

struct ManifestReader<'a> {
    source: &'a str,
    mode: Mode,
    manifest: Option<Manifest>,
}

impl ManifestReader<'_> {
    fn open_element(&mut self, start: &BytesStart<'_>, has_body: bool) -> Result<(), ManifestError> {
        let element = Element {
            source: self.source,
            tag: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            start,
        };

        match self.mode {
            Mode::Options => self.option_element(&element, has_body),
            Mode::Startup | Mode::Shutdown => self.hook_element(&element),
        }
    }

    fn option_element(&mut self, element: &Element<'_>, has_body: bool) -> Result<(), ManifestError> {
        if element.tag == "installation" {
            return self.root_element(element);
        }

        let Some(manifest) = self.manifest.as_mut() else {
            warn!(
                "Error reading {}: <{}> appears before <installation>, ignored",
                element.source, element.tag
            );
            return Ok(());
        };

        let item: Option<ResourceItem> = match element.tag.as_str() {
            "files" => element
                .required(["folder", "archive"])?
                .map(|[folder, archive]| FileTree::new(folder, archive).into()),
            "registry" => element
                .required(["key", "archive"])?
                .map(|[key, archive]| RegistryItem::new(key, archive).into()),
            "tcpip-service" => element
                .required(["name", "port"])?
                .map(|[name, port]| NetworkService::new(name, port).into()),
            "startup" => {
                if has_body {
                    self.mode = Mode::Startup;
                }
                None
            }
            "shutdown" => {
                if has_body {
                    self.mode = Mode::Shutdown;
                }
                None
            }
            _ => {
                element.unsupported();
                None
            }
        };

        if let Some(item) = item {
            manifest.items.push(item);
        }
        Ok(())
    }

    fn root_element(&mut self, element: &Element<'_>) -> Result<(), ManifestError> {
        if self.manifest.is_some() {
            warn!(
                "Error reading {}: nested <installation> ignored",
                element.source
            );
            return Ok(());
        }

        let archive = element
            .attribute("archive")?
            .filter(|archive| !archive.is_empty())
            .ok_or_else(|| ManifestError::MissingArchive(self.source.to_string()))?;
        let name = element.attribute("name")?.unwrap_or_default();
        self.manifest = Some(Manifest::new(name, archive));
        Ok(())
    }

    fn hook_element(&mut self, element: &Element<'_>) -> Result<(), ManifestError> {
        let hook = match element.tag.as_str() {
            "run-sync" => element
                .required(["file"])?
                .map(|[file]| LifecycleHook::RunSync { file }),
            "kill" => element
                .required(["process-name"])?
                .map(|[process_name]| LifecycleHook::Kill { process_name }),
            _ => {
                element.unsupported();
                None
            }
        };

        if let (Some(hook), Some(manifest)) = (hook, self.manifest.as_mut()) {
            match self.mode {
                Mode::Startup => manifest.startup.push(hook),
                Mode::Shutdown => manifest.shutdown.push(hook),
                Mode::Options => {}
            }
        }
        Ok(())
    }

    fn close_element(&mut self, tag: &[u8]) {
        match (self.mode, tag) {
            (Mode::Startup, b"startup") | (Mode::Shutdown, b"shutdown") => {
                self.mode = Mode::Options;
            }
            _ => {}
        }
    }
}

pub(super) fn parse(source: &str, text: &str) -> Result<Manifest, ManifestError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut state = ManifestReader {
        source,
        mode: Mode::Options,
        manifest: None,
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => state.open_element(&start, true)?,
            Ok(Event::Empty(start)) => state.open_element(&start, false)?,
            Ok(Event::End(end)) => state.close_element(end.name().as_ref()),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(ManifestError::Xml {
                    source_name: source.to_string(),
                    error,
                })
            }
        }
    }

    state
        .manifest
        .ok_or_else(|| ManifestError::MissingRoot(source.to_string()))
}
