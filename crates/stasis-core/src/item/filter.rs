//! Which files a file-tree backup leaves out

use glob::{MatchOptions, Pattern};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A path segment whose files are skipped, except for one kept file name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeniedSegment {
    /// `/`-separated fragment matched anywhere in the full path
    pub segment: String,
    /// File name that is archived even under the denied segment
    #[serde(default)]
    pub keep: Option<String>,
}

/// The backup filter applied to every file of a file tree
///
/// A file is excluded when its path contains a denied segment (unless its
/// name is that segment's kept file) or its name matches one of the
/// wildcard patterns. All comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExclusionRules {
    pub patterns: Vec<String>,
    pub denied: Vec<DeniedSegment>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            patterns: vec![
                "*.log*".to_string(),
                "*.mem".to_string(),
                crate::manifest::MANIFEST_FILE_NAME.to_string(),
            ],
            denied: vec![DeniedSegment {
                segment: "jbos/persistence".to_string(),
                keep: Some("logging.properties".to_string()),
            }],
        }
    }
}

impl ExclusionRules {
    /// Rules that exclude nothing
    #[must_use]
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            denied: Vec::new(),
        }
    }

    /// Compile the wildcard patterns once for a whole tree walk
    #[must_use]
    pub fn compile(&self) -> CompiledExclusions<'_> {
        let patterns = self
            .patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("ignoring invalid exclusion pattern '{p}': {e}");
                    None
                }
            })
            .collect();

        CompiledExclusions {
            rules: self,
            patterns,
        }
    }

    /// One-off check; prefer [`compile`](Self::compile) inside loops
    #[must_use]
    pub fn excludes(&self, path: &Path) -> bool {
        self.compile().excludes(path)
    }
}

/// [`ExclusionRules`] with the patterns parsed
#[derive(Debug)]
pub struct CompiledExclusions<'a> {
    rules: &'a ExclusionRules,
    patterns: Vec<Pattern>,
}

impl CompiledExclusions<'_> {
    #[must_use]
    pub fn excludes(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let full = path.to_string_lossy().replace('\\', "/").to_lowercase();

        let denied = self.rules.denied.iter().any(|rule| {
            let segment = rule.segment.replace('\\', "/").to_lowercase();
            // Only the file directly under the segment is kept
            let kept = rule
                .keep
                .as_ref()
                .is_some_and(|keep| full.contains(&format!("{segment}/{}", keep.to_lowercase())));
            !segment.is_empty() && full.contains(&segment) && !kept
        });

        denied
            || self
                .patterns
                .iter()
                .any(|p| p.matches_with(&name, MATCH_OPTIONS))
    }
}
