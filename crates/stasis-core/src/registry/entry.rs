//! In-memory registry subtree

/// A typed registry value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    String(String),
    ExpandString(String),
    MultiString(Vec<String>),
    Dword(u32),
    Qword(u64),
    Binary(Vec<u8>),
    /// Any other value kind, kept as raw bytes
    Other { kind: u32, data: Vec<u8> },
}

impl RegValue {
    /// The numeric `REG_*` kind
    #[must_use]
    pub fn kind(&self) -> u32 {
        match self {
            Self::String(_) => 1,
            Self::ExpandString(_) => 2,
            Self::Binary(_) => 3,
            Self::Dword(_) => 4,
            Self::MultiString(_) => 7,
            Self::Qword(_) => 11,
            Self::Other { kind, .. } => *kind,
        }
    }
}

/// One registry key with its values and child keys
///
/// `path` is always the full, normalized key path (see
/// [`normalize_key_path`](super::normalize_key_path)). Value and key names
/// compare case-insensitively, like the registry itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegKeyEntry {
    path: String,
    values: Vec<(String, RegValue)>,
    keys: Vec<RegKeyEntry>,
}

impl RegKeyEntry {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            values: Vec::new(),
            keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last component of the key path
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('\\').next().unwrap_or(&self.path)
    }

    #[must_use]
    pub fn values(&self) -> &[(String, RegValue)] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&RegValue> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Set a value; the empty name is the key's default value
    pub fn set_value(&mut self, name: impl Into<String>, value: RegValue) {
        let name = name.into();
        if let Some(slot) = self
            .values
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            self.values.push((name, value));
        }
    }

    #[must_use]
    pub fn keys(&self) -> &[RegKeyEntry] {
        &self.keys
    }

    #[must_use]
    pub fn key(&self, name: &str) -> Option<&RegKeyEntry> {
        self.keys.iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Child key `name`, created if it does not exist yet
    pub fn child_mut(&mut self, name: &str) -> &mut RegKeyEntry {
        let index = if let Some(i) = self
            .keys
            .iter()
            .position(|k| k.name().eq_ignore_ascii_case(name))
        {
            i
        } else {
            self.keys
                .push(RegKeyEntry::new(format!("{}\\{name}", self.path)));
            self.keys.len() - 1
        };
        &mut self.keys[index]
    }

    /// Descendant at a backslash-separated relative path, created as needed
    pub fn descend_mut(&mut self, relative: &str) -> &mut RegKeyEntry {
        let mut current = self;
        for segment in relative.split('\\').filter(|s| !s.is_empty()) {
            current = current.child_mut(segment);
        }
        current
    }

    /// True if this key or any descendant carries at least one value
    #[must_use]
    pub fn has_values(&self) -> bool {
        !self.values.is_empty() || self.keys.iter().any(RegKeyEntry::has_values)
    }

    /// Number of keys in this subtree, this one included
    #[must_use]
    pub fn key_count(&self) -> usize {
        1 + self.keys.iter().map(RegKeyEntry::key_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descend_creates_intermediate_keys() {
        let mut root = RegKeyEntry::new("HKEY_LOCAL_MACHINE\\Software\\Vendor");
        root.descend_mut("App\\Settings")
            .set_value("Port", RegValue::Dword(8080));

        let app = root.key("app").unwrap();
        assert_eq!(app.path(), "HKEY_LOCAL_MACHINE\\Software\\Vendor\\App");
        let settings = app.key("Settings").unwrap();
        assert_eq!(settings.name(), "Settings");
        assert_eq!(settings.value("port"), Some(&RegValue::Dword(8080)));
        assert_eq!(root.key_count(), 3);
    }

    #[test]
    fn test_set_value_replaces_case_insensitively() {
        let mut key = RegKeyEntry::new("HKEY_CURRENT_USER\\X");
        key.set_value("Name", RegValue::String("a".into()));
        key.set_value("NAME", RegValue::String("b".into()));
        assert_eq!(key.values().len(), 1);
        assert_eq!(key.value("name"), Some(&RegValue::String("b".into())));
    }

    #[test]
    fn test_has_values_looks_at_descendants() {
        let mut root = RegKeyEntry::new("HKEY_CURRENT_USER\\X");
        root.descend_mut("a\\b");
        assert!(!root.has_values());
        root.descend_mut("a\\b").set_value("", RegValue::String("d".into()));
        assert!(root.has_values());
    }
}
