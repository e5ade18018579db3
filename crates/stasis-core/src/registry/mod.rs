//! Registry subtrees: the in-memory model, the REGEDIT4 codec, and backends
//!
//! A [`Registry`] backend imports a whole subtree into a [`RegKeyEntry`],
//! writes one back, or deletes one. The registry resource item only ever
//! talks to the trait.

pub mod entry;
pub mod memory;
pub mod regfile;
#[cfg(windows)]
pub mod windows;

pub use entry::{RegKeyEntry, RegValue};
pub use memory::MemoryRegistry;

use thiserror::Error;

/// Errors raised by registry backends and the REGEDIT4 codec
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown registry hive in '{0}'")]
    UnknownHive(String),

    #[error("Registry I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a REGEDIT4 document: {0}")]
    InvalidFormat(String),

    #[error("Key '{key}' is outside the exported root '{root}'")]
    OutsideRoot { key: String, root: String },
}

/// How a subtree is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Write child keys as well as the root key
    pub recursive: bool,
    /// Grant every local user full access to the written keys
    pub all_access_for_everyone: bool,
}

impl WriteOptions {
    /// The options a restore uses: whole subtree, open to all users
    #[must_use]
    pub fn shared_recursive() -> Self {
        Self {
            recursive: true,
            all_access_for_everyone: true,
        }
    }
}

/// Capability contract for registry access
pub trait Registry: Send + Sync {
    /// Read the subtree at `key_path`, or `None` if the key does not exist
    ///
    /// # Errors
    /// Returns an error if the path is malformed or the backend fails
    fn import(&self, key_path: &str) -> Result<Option<RegKeyEntry>, RegistryError>;

    /// Create the keys of `entry` and set their values
    ///
    /// # Errors
    /// Returns an error if any key or value cannot be written
    fn write(&self, entry: &RegKeyEntry, options: WriteOptions) -> Result<(), RegistryError>;

    /// Delete `key_path` and everything below it; an absent key is not an error
    ///
    /// # Errors
    /// Returns an error if the path is malformed or deletion fails
    fn delete_tree(&self, key_path: &str) -> Result<(), RegistryError>;
}

const HIVES: &[(&str, &str)] = &[
    ("HKLM", "HKEY_LOCAL_MACHINE"),
    ("HKCU", "HKEY_CURRENT_USER"),
    ("HKCR", "HKEY_CLASSES_ROOT"),
    ("HKU", "HKEY_USERS"),
    ("HKCC", "HKEY_CURRENT_CONFIG"),
];

/// Canonical form of a key path: long hive name, single backslashes, no
/// leading or trailing separator
///
/// # Errors
/// Returns an error if the first component is not a known hive
pub fn normalize_key_path(path: &str) -> Result<String, RegistryError> {
    let mut parts = path.split(['\\', '/']).filter(|p| !p.is_empty());
    let hive = parts
        .next()
        .ok_or_else(|| RegistryError::UnknownHive(path.to_string()))?;

    let hive = HIVES
        .iter()
        .find(|(short, long)| hive.eq_ignore_ascii_case(short) || hive.eq_ignore_ascii_case(long))
        .map(|(_, long)| *long)
        .ok_or_else(|| RegistryError::UnknownHive(path.to_string()))?;

    let mut normalized = hive.to_string();
    for part in parts {
        normalized.push('\\');
        normalized.push_str(part);
    }
    Ok(normalized)
}

/// The registry backend for the current platform
///
/// Hosts without a native registry get an empty [`MemoryRegistry`], so
/// registry items simply report that their key does not exist.
#[must_use]
pub fn default_registry() -> Box<dyn Registry> {
    #[cfg(windows)]
    {
        Box::new(windows::WindowsRegistry)
    }
    #[cfg(not(windows))]
    {
        Box::new(MemoryRegistry::new())
    }
}
