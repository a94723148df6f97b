//! Exclusion rules applied while walking the backup root.

use std::path::{Component, Path, PathBuf};

use regex::RegexSet;

use crate::error::ArchiveError;

/// Compiled exclusion rules for one archive run.
///
/// Patterns are regular expressions matched against the `/`-separated path
/// relative to the backup root. Directories listed with
/// [`ExcludeRules::exclude_dir`] are excluded by absolute path prefix.
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    patterns: RegexSet,
    excluded_dirs: Vec<PathBuf>,
}

impl ExcludeRules {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ArchiveError> {
        let patterns = RegexSet::new(patterns.iter().map(|p| p.as_ref()))?;
        Ok(Self {
            patterns,
            excluded_dirs: Vec::new(),
        })
    }

    /// Exclude everything below `dir`.
    pub fn exclude_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded_dirs.push(dir.into());
        self
    }

    /// Check an absolute path and its entry name against the rules.
    pub fn is_excluded(&self, path: &Path, entry_name: &str) -> bool {
        self.excluded_dirs.iter().any(|dir| path.starts_with(dir))
            || self.patterns.is_match(entry_name)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

/// Turn a path relative to the backup root into a ZIP entry name.
///
/// Separators are normalized to `/`; `.` components are dropped.
pub fn normalize_entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
