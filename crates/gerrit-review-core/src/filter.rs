//! Path exclusion filtering.
//!
//! Patterns are compiled once when the configuration is resolved and shared
//! read-only afterwards. Matching is an unanchored regex search, so
//! `\.pbxproj$` and `vendor/` both work as users expect.

use regex::Regex;
use tracing::warn;

use crate::types::{ExcludedFile, FileDiff};

/// Ordered set of compiled exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Compile a comma-separated pattern list. Patterns that fail to compile
    /// are dropped with a warning.
    pub fn parse(raw: &str) -> Self {
        let patterns = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = p, error = %e, "Dropping invalid exclusion pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Source text of every compiled pattern.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    /// First pattern matching `path`, if any.
    pub fn matching_pattern(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(path))
            .map(Regex::as_str)
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }

    /// Split files into kept and excluded, preserving input order.
    pub fn partition(&self, files: Vec<FileDiff>) -> (Vec<FileDiff>, Vec<ExcludedFile>) {
        let mut kept = Vec::with_capacity(files.len());
        let mut excluded = Vec::new();
        for file in files {
            match self.matching_pattern(&file.path) {
                Some(pattern) => excluded.push(ExcludedFile {
                    path: file.path,
                    pattern: pattern.to_string(),
                }),
                None => kept.push(file),
            }
        }
        (kept, excluded)
    }
}

/// Remove every file whose path matches any pattern.
pub fn filter_files(files: Vec<FileDiff>, filter: &ExclusionFilter) -> Vec<FileDiff> {
    files
        .into_iter()
        .filter(|f| !filter.is_excluded(&f.path))
        .collect()
}
