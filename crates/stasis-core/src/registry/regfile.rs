//! REGEDIT4 text codec for registry subtrees
//!
//! This is the blob format a registry item stores in the archive. The
//! exported root key is always written, even without values, so the import
//! side knows where the subtree starts.

use super::entry::{RegKeyEntry, RegValue};
use super::{normalize_key_path, RegistryError};
use std::fmt::Write as _;
use tracing::warn;

const HEADER: &str = "REGEDIT4";
const HEX_BYTES_PER_LINE: usize = 25;

/// Export behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Skip sub-keys that carry no values anywhere in their subtree
    pub no_empty_keys: bool,
}

/// Render a subtree as a REGEDIT4 document
#[must_use]
pub fn export(root: &RegKeyEntry, options: ExportOptions) -> String {
    let mut out = String::from(HEADER);
    out.push_str("\r\n");
    write_key(&mut out, root, options, true);
    out
}

fn write_key(out: &mut String, key: &RegKeyEntry, options: ExportOptions, is_root: bool) {
    if is_root || !options.no_empty_keys || !key.values().is_empty() {
        let _ = write!(out, "\r\n[{}]\r\n", key.path());
        for (name, value) in key.values() {
            write_value(out, name, value);
        }
    }

    for child in key.keys() {
        if options.no_empty_keys && !child.has_values() {
            continue;
        }
        write_key(out, child, options, false);
    }
}

fn write_value(out: &mut String, name: &str, value: &RegValue) {
    if name.is_empty() {
        out.push('@');
    } else {
        push_quoted(out, name);
    }
    out.push('=');

    match value {
        RegValue::String(s) if !s.contains(['\r', '\n']) => {
            push_quoted(out, s);
            out.push_str("\r\n");
        }
        RegValue::Dword(v) => {
            let _ = write!(out, "dword:{v:08x}\r\n");
        }
        RegValue::Binary(bytes) => write_hex(out, "hex:", bytes),
        other => {
            let prefix = format!("hex({:x}):", other.kind());
            write_hex(out, &prefix, &value_bytes(other));
        }
    }
}

/// Byte encoding used by the `hex(n):` forms
fn value_bytes(value: &RegValue) -> Vec<u8> {
    match value {
        RegValue::String(s) | RegValue::ExpandString(s) => {
            let mut bytes = s.as_bytes().to_vec();
            bytes.push(0);
            bytes
        }
        RegValue::MultiString(items) => {
            let mut bytes = Vec::new();
            for item in items {
                bytes.extend_from_slice(item.as_bytes());
                bytes.push(0);
            }
            bytes.push(0);
            bytes
        }
        RegValue::Dword(v) => v.to_le_bytes().to_vec(),
        RegValue::Qword(v) => v.to_le_bytes().to_vec(),
        RegValue::Binary(bytes) | RegValue::Other { data: bytes, .. } => bytes.clone(),
    }
}

fn write_hex(out: &mut String, prefix: &str, bytes: &[u8]) {
    out.push_str(prefix);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(',');
            if i % HEX_BYTES_PER_LINE == 0 {
                out.push_str("\\\r\n  ");
            }
        }
        let _ = write!(out, "{b:02x}");
    }
    out.push_str("\r\n");
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// Parse a REGEDIT4 document back into a subtree
///
/// The first section names the root. Deletion sections (`[-KEY]`), value
/// deletions (`"name"=-`), and lines that cannot be parsed are skipped.
///
/// # Errors
/// Returns an error if the header is missing, no key section exists, or a
/// section names an unknown hive
pub fn import(text: &str) -> Result<RegKeyEntry, RegistryError> {
    let lines = logical_lines(text.trim_start_matches('\u{feff}'));
    let mut lines = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());

    match lines.next() {
        Some(first) if first == HEADER => {}
        Some(first) => return Err(RegistryError::InvalidFormat(first.to_string())),
        None => return Err(RegistryError::InvalidFormat("empty document".into())),
    }

    let mut root: Option<RegKeyEntry> = None;
    // Path of the current section relative to the root; None while skipping
    let mut current: Option<String> = None;

    for line in lines {
        if line.starts_with(';') {
            continue;
        }

        if let Some(inner) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            if inner.starts_with('-') {
                current = None;
                continue;
            }
            let path = normalize_key_path(inner)?;
            if let Some(r) = &root {
                current = relative_to(r.path(), &path).map(str::to_string);
                if current.is_none() {
                    warn!(
                        "{}",
                        RegistryError::OutsideRoot {
                            key: path,
                            root: r.path().to_string(),
                        }
                    );
                }
            } else {
                root = Some(RegKeyEntry::new(path));
                current = Some(String::new());
            }
            if let (Some(r), Some(rel)) = (root.as_mut(), current.as_deref()) {
                r.descend_mut(rel);
            }
            continue;
        }

        let (Some(r), Some(rel)) = (root.as_mut(), current.as_deref()) else {
            continue;
        };
        match parse_value_line(line) {
            Some((name, Some(value))) => r.descend_mut(rel).set_value(name, value),
            Some((_, None)) => {}
            None => warn!("skipping unreadable registry line: {line}"),
        }
    }

    root.ok_or_else(|| RegistryError::InvalidFormat("no key sections".into()))
}

/// Join `\`-continued lines
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let piece = if pending.is_empty() {
            raw.trim_end()
        } else {
            raw.trim()
        };
        if let Some(stripped) = piece.strip_suffix('\\') {
            pending.push_str(stripped);
        } else {
            pending.push_str(piece);
            lines.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        lines.push(pending);
    }
    lines
}

fn relative_to<'a>(root: &str, path: &'a str) -> Option<&'a str> {
    if path.eq_ignore_ascii_case(root) {
        return Some("");
    }
    let prefix_len = root.len() + 1;
    let head = path.get(..prefix_len)?;
    if head.get(..root.len())?.eq_ignore_ascii_case(root) && head.ends_with('\\') {
        Some(&path[prefix_len..])
    } else {
        None
    }
}

/// Parse `"name"=data` or `@=data`; `None` data means a value deletion
fn parse_value_line(line: &str) -> Option<(String, Option<RegValue>)> {
    let (name, rest) = if let Some(rest) = line.strip_prefix('@') {
        (String::new(), rest)
    } else {
        let (name, consumed) = parse_quoted(line)?;
        (name, &line[consumed..])
    };

    let data = rest.trim_start().strip_prefix('=')?.trim();
    if data == "-" {
        return Some((name, None));
    }
    if data.starts_with('"') {
        let (s, _) = parse_quoted(data)?;
        return Some((name, Some(RegValue::String(s))));
    }

    let lower = data.to_ascii_lowercase();
    let value = if lower.starts_with("dword:") {
        RegValue::Dword(u32::from_str_radix(data[6..].trim(), 16).ok()?)
    } else if lower.starts_with("hex:") {
        RegValue::Binary(parse_hex(&data[4..])?)
    } else if lower.starts_with("hex(") {
        let (kind, bytes) = data[4..].split_once("):")?;
        let kind = u32::from_str_radix(kind.trim(), 16).ok()?;
        typed_from_bytes(kind, parse_hex(bytes)?)
    } else {
        return None;
    };
    Some((name, Some(value)))
}

/// Parse a leading quoted string; returns the text and the byte length consumed
fn parse_quoted(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some((out, i + 2));
        } else {
            out.push(c);
        }
    }
    None
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    s.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| u8::from_str_radix(b, 16).ok())
        .collect()
}

fn typed_from_bytes(kind: u32, bytes: Vec<u8>) -> RegValue {
    match kind {
        1 => RegValue::String(decode_terminated(&bytes)),
        2 => RegValue::ExpandString(decode_terminated(&bytes)),
        3 => RegValue::Binary(bytes),
        4 if bytes.len() == 4 => {
            RegValue::Dword(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        7 => RegValue::MultiString(
            bytes
                .split(|b| *b == 0)
                .take_while(|part| !part.is_empty())
                .map(|part| String::from_utf8_lossy(part).into_owned())
                .collect(),
        ),
        11 if bytes.len() == 8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes);
            RegValue::Qword(u64::from_le_bytes(raw))
        }
        _ => RegValue::Other { kind, data: bytes },
    }
}

fn decode_terminated(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
