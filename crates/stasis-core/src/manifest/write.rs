//! Manifest writer

use super::{Manifest, ManifestError};
use crate::hook::LifecycleHook;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;

fn write_hooks<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    hooks: &[LifecycleHook],
) -> quick_xml::Result<()> {
    if hooks.is_empty() {
        return writer.write_event(Event::Empty(BytesStart::new(tag)));
    }

    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    for hook in hooks {
        hook.write_element(writer)?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

pub(super) fn to_xml(manifest: &Manifest) -> Result<String, ManifestError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("installation").with_attributes([
        ("name", manifest.name.as_str()),
        ("archive", manifest.archive.as_str()),
    ])))?;

    for item in &manifest.items {
        item.write_element(&mut writer)?;
    }
    write_hooks(&mut writer, "startup", &manifest.startup)?;
    write_hooks(&mut writer, "shutdown", &manifest.shutdown)?;

    writer.write_event(Event::End(BytesEnd::new("installation")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
