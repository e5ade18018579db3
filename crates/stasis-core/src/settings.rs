//! `stasis.toml`: where archives live and how backups behave

use crate::item::ExclusionRules;
use crate::manifest::MANIFEST_FILE_NAME;
use crate::util::expand_env_vars;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Settings file name inside the per-user config directory
pub const SETTINGS_FILE_NAME: &str = "stasis.toml";

/// Environment variable naming an explicit settings file
pub const SETTINGS_ENV: &str = "STASIS_CONFIG";

pub const DEFAULT_MAX_SNAPSHOTS: i32 = 10;

/// Errors while loading settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot read settings '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid settings in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The file as written; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    base_directory: Option<String>,
    installation_file: Option<String>,
    max_snapshots: Option<i32>,
    exclusions: ExclusionRules,
}

/// Resolved settings with every default applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding the archives and the default template
    pub base_directory: PathBuf,
    /// The live configuration describing what is installed now
    pub installation_file: PathBuf,
    /// Snapshot limit; zero or less means unbounded
    pub max_snapshots: i32,
    pub exclusions: ExclusionRules,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_base_directory(default_base_directory())
    }
}

/// `<data_dir>/stasis`, or `./stasis` without a data directory
#[must_use]
pub fn default_base_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stasis")
}

/// `<config_dir>/stasis/stasis.toml`, if the platform has a config directory
#[must_use]
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stasis").join(SETTINGS_FILE_NAME))
}

fn expand_path(value: &str) -> PathBuf {
    PathBuf::from(expand_env_vars(value))
}

impl Settings {
    /// Defaults rooted at `base_directory`
    #[must_use]
    pub fn with_base_directory(base_directory: impl Into<PathBuf>) -> Self {
        let base_directory = base_directory.into();
        Self {
            installation_file: base_directory.join("current").join(MANIFEST_FILE_NAME),
            base_directory,
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            exclusions: ExclusionRules::default(),
        }
    }

    /// Parse settings text; `path` only appears in errors
    ///
    /// # Errors
    /// Returns an error if the text is not valid settings TOML
    pub fn parse(path: &Path, text: &str) -> Result<Self, SettingsError> {
        let file: SettingsFile = toml::from_str(text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base_directory = file
            .base_directory
            .as_deref()
            .map_or_else(default_base_directory, expand_path);
        let mut settings = Self::with_base_directory(base_directory);

        if let Some(installation_file) = file.installation_file.as_deref() {
            settings.installation_file = expand_path(installation_file);
        }
        if let Some(max_snapshots) = file.max_snapshots {
            settings.max_snapshots = max_snapshots;
        }
        settings.exclusions = file.exclusions;
        Ok(settings)
    }

    /// Load settings from `path`; a missing file yields the defaults
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load from `explicit`, then `$STASIS_CONFIG`, then the per-user default
    ///
    /// # Errors
    /// Returns an error if the chosen file exists but is unreadable or invalid
    pub fn discover(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(SETTINGS_ENV).map(PathBuf::from))
            .or_else(default_settings_path);

        match path {
            Some(path) => {
                debug!("settings from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::DeniedSegment;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::parse(Path::new("s.toml"), "").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_snapshots, 10);
        assert!(settings
            .installation_file
            .ends_with(Path::new("current").join("installation.xml")));
    }

    #[test]
    fn test_full_file() {
        std::env::set_var("STASIS_SETTINGS_TEST_ROOT", "/srv");
        let text = r#"
base_directory = "%STASIS_SETTINGS_TEST_ROOT%/stasis"
installation_file = "/opt/app/installation.xml"
max_snapshots = 3

[exclusions]
patterns = ["*.tmp"]

[[exclusions.denied]]
segment = "cache/"
"#;
        let settings = Settings::parse(Path::new("s.toml"), text).unwrap();

        assert_eq!(settings.base_directory, PathBuf::from("/srv/stasis"));
        assert_eq!(
            settings.installation_file,
            PathBuf::from("/opt/app/installation.xml")
        );
        assert_eq!(settings.max_snapshots, 3);
        assert_eq!(settings.exclusions.patterns, vec!["*.tmp"]);
        assert_eq!(
            settings.exclusions.denied,
            vec![DeniedSegment {
                segment: "cache/".into(),
                keep: None
            }]
        );
    }

    #[test]
    fn test_installation_file_follows_base_directory() {
        let settings = Settings::parse(Path::new("s.toml"), "base_directory = \"/data\"").unwrap();
        assert_eq!(
            settings.installation_file,
            PathBuf::from("/data/current/installation.xml")
        );
    }

    #[test]
    fn test_partial_exclusions_keep_default_segments() {
        let settings =
            Settings::parse(Path::new("s.toml"), "[exclusions]\npatterns = []\n").unwrap();
        assert!(settings.exclusions.patterns.is_empty());
        assert_eq!(
            settings.exclusions.denied,
            ExclusionRules::default().denied
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(matches!(
            Settings::parse(Path::new("s.toml"), "max_snapshots = \"many\""),
            Err(SettingsError::Parse { .. })
        ));
        assert!(Settings::parse(Path::new("s.toml"), "unknown_key = 1").is_err());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load(&temp.path().join("stasis.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_discover_prefers_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stasis.toml");
        fs::write(&path, "max_snapshots = 0").unwrap();

        let settings = Settings::discover(Some(&path)).unwrap();
        assert_eq!(settings.max_snapshots, 0);
    }
}
