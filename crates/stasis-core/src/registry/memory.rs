//! Registry backend that lives entirely in memory

use super::entry::{RegKeyEntry, RegValue};
use super::{normalize_key_path, Registry, RegistryError, WriteOptions};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
struct StoredKey {
    path: String,
    values: Vec<(String, RegValue)>,
}

/// A flat map of key paths to values, keyed case-insensitively
///
/// Writing a key creates its missing ancestors, the way the real registry
/// does. Hosts without a native registry use an empty one.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    keys: Mutex<BTreeMap<String, StoredKey>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build(map: &BTreeMap<String, StoredKey>, lower: &str) -> Option<RegKeyEntry> {
        let stored = map.get(lower)?;
        let mut entry = RegKeyEntry::new(stored.path.clone());
        for (name, value) in &stored.values {
            entry.set_value(name.clone(), value.clone());
        }

        let prefix = format!("{lower}\\");
        let children: Vec<&String> = map
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('\\'))
            .map(|(k, _)| k)
            .collect();

        for child_key in children {
            if let Some(child) = Self::build(map, child_key) {
                let name = child.name().to_string();
                *entry.child_mut(&name) = child;
            }
        }
        Some(entry)
    }

    fn store(
        map: &mut BTreeMap<String, StoredKey>,
        entry: &RegKeyEntry,
        recursive: bool,
    ) -> Result<(), RegistryError> {
        let path = normalize_key_path(entry.path())?;

        // Ancestors first, without touching their values
        let mut ancestor = String::new();
        for segment in path.split('\\') {
            if !ancestor.is_empty() {
                ancestor.push('\\');
            }
            ancestor.push_str(segment);
            map.entry(ancestor.to_ascii_lowercase())
                .or_insert_with(|| StoredKey {
                    path: ancestor.clone(),
                    values: Vec::new(),
                });
        }

        if let Some(stored) = map.get_mut(&path.to_ascii_lowercase()) {
            for (name, value) in entry.values() {
                if let Some(slot) = stored
                    .values
                    .iter_mut()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                {
                    slot.1 = value.clone();
                } else {
                    stored.values.push((name.clone(), value.clone()));
                }
            }
        }

        if recursive {
            for child in entry.keys() {
                Self::store(map, child, true)?;
            }
        }
        Ok(())
    }
}

impl Registry for MemoryRegistry {
    fn import(&self, key_path: &str) -> Result<Option<RegKeyEntry>, RegistryError> {
        let lower = normalize_key_path(key_path)?.to_ascii_lowercase();
        Ok(Self::build(&self.lock(), &lower))
    }

    fn write(&self, entry: &RegKeyEntry, options: WriteOptions) -> Result<(), RegistryError> {
        Self::store(&mut self.lock(), entry, options.recursive)
    }

    fn delete_tree(&self, key_path: &str) -> Result<(), RegistryError> {
        let lower = normalize_key_path(key_path)?.to_ascii_lowercase();
        let prefix = format!("{lower}\\");
        self.lock()
            .retain(|k, _| *k != lower && !k.starts_with(&prefix));
        Ok(())
    }
}
