//! Upload boundary: which files are accepted as legacy sources.
//!
//! Only names ending in a recognized extension (case-insensitive) become
//! source artifacts; everything else is dropped and counted.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Artifact;

/// A file handed over by the caller, before filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub content: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Result of filtering an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredUpload {
    /// Accepted files, in upload order, first occurrence of each name
    pub accepted: Vec<Artifact>,

    /// Files with an unrecognized extension
    pub rejected: usize,

    /// Later files whose name repeated an accepted one
    pub duplicates: usize,
}

/// Extension filter for uploaded sources
#[derive(Debug, Clone)]
pub struct UploadFilter {
    patterns: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl Default for UploadFilter {
    fn default() -> Self {
        Self::new(&crate::config::default_extensions())
    }
}

impl UploadFilter {
    /// Build a filter from extensions such as `cbl` or `.cob`
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        let patterns = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .filter_map(|ext| Pattern::new(&format!("*.{}", Pattern::escape(ext))).ok())
            .collect();
        Self { patterns }
    }

    /// Check whether a file name has a recognized extension
    pub fn accepts(&self, name: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(name, MATCH_OPTIONS))
    }

    /// Split an upload into source artifacts and a count of dropped files
    pub fn filter(&self, files: Vec<UploadedFile>) -> FilteredUpload {
        let mut result = FilteredUpload::default();

        for file in files {
            if !self.accepts(&file.name) {
                debug!(name = %file.name, "Dropping file with unrecognized extension");
                result.rejected += 1;
                continue;
            }
            if result.accepted.iter().any(|a| a.name == file.name) {
                debug!(name = %file.name, "Dropping duplicate file name");
                result.duplicates += 1;
                continue;
            }
            result.accepted.push(Artifact::source(file.name, file.content));
        }

        result
    }
}
