//! Unified types returned by the review engine.
//!
//! These are provider-neutral views; the raw Gerrit REST shapes live in the
//! API crate and are mapped into these.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque Gerrit change identifier (number, Change-Id or `project~branch~id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    /// Wrap a change id, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(Error::InvalidInput("change_id must not be empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChangeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which patchset of a change to look at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatchsetSelector {
    /// The highest-numbered patchset known to the change
    Current,
    /// A specific patchset number, kept as the caller wrote it
    Number(String),
}

impl PatchsetSelector {
    /// Parse a caller-supplied patchset; `None`, `current` and `latest` all
    /// select the current patchset.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Current,
            Some(value)
                if value.eq_ignore_ascii_case("current") || value.eq_ignore_ascii_case("latest") =>
            {
                Self::Current
            }
            Some(value) => Self::Number(value.to_string()),
        }
    }
}

impl fmt::Display for PatchsetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Number(n) => f.write_str(n),
        }
    }
}

/// A change plus one of its patchsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchsetRef {
    pub change_id: ChangeId,
    pub patchset: PatchsetSelector,
}

impl PatchsetRef {
    /// Validate the change id and parse the patchset in one step.
    pub fn parse(change_id: &str, patchset: Option<&str>) -> Result<Self> {
        Ok(Self {
            change_id: ChangeId::new(change_id)?,
            patchset: PatchsetSelector::parse(patchset),
        })
    }
}

// =============================================================================
// Files
// =============================================================================

/// How a file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// One file of a change or of a patchset comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    /// Previous path, only for renames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub insertions: u64,
    pub deletions: u64,
    /// Unified diff text; never set for binary files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_content: Option<String>,
    #[serde(default)]
    pub binary: bool,
}

impl FileDiff {
    /// Attach diff text unless the file is binary.
    pub fn with_diff(mut self, diff: Option<String>) -> Self {
        self.diff_content = if self.binary { None } else { diff };
        self
    }
}

/// A file left out of a result because an exclusion pattern matched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedFile {
    pub path: String,
    pub pattern: String,
}

// =============================================================================
// Comments
// =============================================================================

/// A review comment anchored to a file (and optionally a line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineComment {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub author: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patchset_number: Option<u32>,
    #[serde(default)]
    pub unresolved: bool,
}

/// Outcome of the optional comment retrieval step.
///
/// Comment failures never fail the change fetch; they are carried here and
/// folded into the view as a soft error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentFetch {
    NotRequested,
    Fetched(Vec<InlineComment>),
    Failed(String),
}

// =============================================================================
// Views
// =============================================================================

/// Aggregated view of one change at one patchset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeView {
    pub change_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_number: Option<u64>,
    pub project: String,
    pub branch: String,
    pub subject: String,
    pub status: String,
    pub owner: String,
    /// Highest patchset number of the change
    pub current_patchset: u32,
    /// Patchset this view was built from
    pub patchset: u32,
    /// Commit sha of `patchset`
    pub revision: String,
    pub files: Vec<FileDiff>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_files: Vec<ExcludedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_comments: Option<Vec<InlineComment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_fetch_error: Option<String>,
}

impl ChangeView {
    /// Fold the comment step outcome into the view.
    pub fn with_comments(mut self, comments: CommentFetch) -> Self {
        match comments {
            CommentFetch::NotRequested => {
                self.inline_comments = None;
                self.comment_fetch_error = None;
            }
            CommentFetch::Fetched(list) => {
                self.inline_comments = Some(list);
                self.comment_fetch_error = None;
            }
            CommentFetch::Failed(reason) => {
                self.inline_comments = None;
                self.comment_fetch_error = Some(reason);
            }
        }
        self
    }
}

/// Files that differ between two patchsets of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchsetDiffResult {
    pub change_id: String,
    pub base_patchset: String,
    pub target_patchset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
    pub files: Vec<FileDiff>,
}

impl PatchsetDiffResult {
    /// A result with no differing files.
    pub fn empty(
        change_id: impl Into<String>,
        base_patchset: impl Into<String>,
        target_patchset: impl Into<String>,
    ) -> Self {
        Self {
            change_id: change_id.into(),
            base_patchset: base_patchset.into(),
            target_patchset: target_patchset.into(),
            base_revision: None,
            target_revision: None,
            files: vec![],
        }
    }
}

// =============================================================================
// Review submission
// =============================================================================

/// Character range of an inline comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRange {
    pub start_line: i64,
    #[serde(default)]
    pub start_character: i64,
    pub end_line: i64,
    #[serde(default)]
    pub end_character: i64,
}

/// Draft inline comment as supplied by the caller; validated before posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub range: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub unresolved: Option<bool>,
}

/// Review to post on a patchset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, i32>,
    #[serde(default)]
    pub comments: Vec<ReviewComment>,
    /// Gerrit notify handling (`NONE`, `OWNER`, `OWNER_REVIEWERS`, `ALL`)
    #[serde(default)]
    pub notify: Option<String>,
}

impl ReviewRequest {
    /// Whether there is anything to post.
    pub fn is_empty(&self) -> bool {
        self.message.as_deref().is_none_or(|m| m.trim().is_empty())
            && self.labels.is_empty()
            && self.comments.is_empty()
    }
}

/// What Gerrit applied after a review was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub change_id: String,
    pub revision: String,
    pub patchset: u32,
    #[serde(default)]
    pub labels: BTreeMap<String, i32>,
}
