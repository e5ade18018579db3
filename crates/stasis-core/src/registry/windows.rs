//! Native registry backend (32-bit view)

use super::entry::{RegKeyEntry, RegValue};
use super::{normalize_key_path, Registry, RegistryError, WriteOptions};
use std::io;
use tracing::debug;
use winreg::enums::{
    RegType, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE,
    HKEY_USERS, KEY_ALL_ACCESS, KEY_READ, KEY_WOW64_32KEY,
};
use winreg::{RegKey, RegValue as NativeValue};

/// Registry access through `winreg`, always on the 32-bit view
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

fn io_error(path: &str, source: io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.to_string(),
        source,
    }
}

/// Split a normalized path into its predefined hive and the remaining sub-path
fn open_hive(path: &str) -> Result<(RegKey, &str), RegistryError> {
    let (hive, rest) = path.split_once('\\').unwrap_or((path, ""));
    let predef = match hive {
        "HKEY_LOCAL_MACHINE" => HKEY_LOCAL_MACHINE,
        "HKEY_CURRENT_USER" => HKEY_CURRENT_USER,
        "HKEY_CLASSES_ROOT" => HKEY_CLASSES_ROOT,
        "HKEY_USERS" => HKEY_USERS,
        "HKEY_CURRENT_CONFIG" => HKEY_CURRENT_CONFIG,
        _ => return Err(RegistryError::UnknownHive(path.to_string())),
    };
    Ok((RegKey::predef(predef), rest))
}

fn read_key(key: &RegKey, path: String) -> io::Result<RegKeyEntry> {
    let mut entry = RegKeyEntry::new(path);

    for value in key.enum_values() {
        let (name, native) = value?;
        entry.set_value(name, from_native(native));
    }

    let names: Vec<String> = key.enum_keys().collect::<io::Result<_>>()?;
    for name in names {
        let child = key.open_subkey_with_flags(&name, KEY_READ | KEY_WOW64_32KEY)?;
        let child_entry = read_key(&child, format!("{}\\{name}", entry.path()))?;
        *entry.child_mut(&name) = child_entry;
    }

    Ok(entry)
}

fn write_key(hive: &RegKey, sub_path: &str, entry: &RegKeyEntry, recursive: bool) -> io::Result<()> {
    let (key, _) = hive.create_subkey_with_flags(sub_path, KEY_ALL_ACCESS | KEY_WOW64_32KEY)?;
    for (name, value) in entry.values() {
        key.set_raw_value(name, &to_native(value))?;
    }

    if recursive {
        for child in entry.keys() {
            let child_path = format!("{sub_path}\\{}", child.name());
            write_key(hive, &child_path, child, true)?;
        }
    }
    Ok(())
}

fn decode_utf16(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn encode_utf16(s: &str, out: &mut Vec<u8>) {
    for unit in s.encode_utf16().chain(std::iter::once(0)) {
        out.extend_from_slice(&unit.to_le_bytes());
    }
}

fn from_native(native: NativeValue) -> RegValue {
    let text = |bytes: &[u8]| {
        let units = decode_utf16(bytes);
        let end = units.iter().position(|u| *u == 0).unwrap_or(units.len());
        String::from_utf16_lossy(&units[..end])
    };

    let NativeValue { bytes, vtype } = native;
    match vtype {
        RegType::REG_SZ => RegValue::String(text(&bytes)),
        RegType::REG_EXPAND_SZ => RegValue::ExpandString(text(&bytes)),
        RegType::REG_MULTI_SZ => RegValue::MultiString(
            decode_utf16(&bytes)
                .split(|u| *u == 0)
                .take_while(|part| !part.is_empty())
                .map(String::from_utf16_lossy)
                .collect(),
        ),
        RegType::REG_DWORD if bytes.len() == 4 => {
            RegValue::Dword(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        RegType::REG_QWORD if bytes.len() == 8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes);
            RegValue::Qword(u64::from_le_bytes(raw))
        }
        RegType::REG_BINARY => RegValue::Binary(bytes),
        other => RegValue::Other {
            kind: other as u32,
            data: bytes,
        },
    }
}

fn to_native(value: &RegValue) -> NativeValue {
    let mut bytes = Vec::new();
    let vtype = match value {
        RegValue::String(s) => {
            encode_utf16(s, &mut bytes);
            RegType::REG_SZ
        }
        RegValue::ExpandString(s) => {
            encode_utf16(s, &mut bytes);
            RegType::REG_EXPAND_SZ
        }
        RegValue::MultiString(items) => {
            for item in items {
                encode_utf16(item, &mut bytes);
            }
            bytes.extend_from_slice(&[0, 0]);
            RegType::REG_MULTI_SZ
        }
        RegValue::Dword(v) => {
            bytes.extend_from_slice(&v.to_le_bytes());
            RegType::REG_DWORD
        }
        RegValue::Qword(v) => {
            bytes.extend_from_slice(&v.to_le_bytes());
            RegType::REG_QWORD
        }
        RegValue::Binary(data) => {
            bytes.extend_from_slice(data);
            RegType::REG_BINARY
        }
        RegValue::Other { kind, data } => {
            bytes.extend_from_slice(data);
            match kind {
                0 => RegType::REG_NONE,
                5 => RegType::REG_DWORD_BIG_ENDIAN,
                6 => RegType::REG_LINK,
                8 => RegType::REG_RESOURCE_LIST,
                9 => RegType::REG_FULL_RESOURCE_DESCRIPTOR,
                10 => RegType::REG_RESOURCE_REQUIREMENTS_LIST,
                _ => RegType::REG_BINARY,
            }
        }
    };
    NativeValue { bytes, vtype }
}

impl Registry for WindowsRegistry {
    fn import(&self, key_path: &str) -> Result<Option<RegKeyEntry>, RegistryError> {
        let path = normalize_key_path(key_path)?;
        let (hive, sub_path) = open_hive(&path)?;

        let key = match hive.open_subkey_with_flags(sub_path, KEY_READ | KEY_WOW64_32KEY) {
            Ok(key) => key,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        read_key(&key, path.clone())
            .map(Some)
            .map_err(|e| io_error(&path, e))
    }

    fn write(&self, entry: &RegKeyEntry, options: WriteOptions) -> Result<(), RegistryError> {
        let path = normalize_key_path(entry.path())?;
        let (hive, sub_path) = open_hive(&path)?;

        if options.all_access_for_everyone {
            // winreg creates keys with the caller's default security descriptor;
            // per-user grants are the machine installer's concern.
            debug!("writing {path} with inherited access rules");
        }

        write_key(&hive, sub_path, entry, options.recursive).map_err(|e| io_error(&path, e))
    }

    fn delete_tree(&self, key_path: &str) -> Result<(), RegistryError> {
        let path = normalize_key_path(key_path)?;
        let (hive, sub_path) = open_hive(&path)?;
        let (parent_path, leaf) = sub_path.rsplit_once('\\').unwrap_or(("", sub_path));

        let parent = match hive.open_subkey_with_flags(parent_path, KEY_ALL_ACCESS | KEY_WOW64_32KEY)
        {
            Ok(parent) => parent,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(&path, e)),
        };

        match parent.delete_subkey_all(leaf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
