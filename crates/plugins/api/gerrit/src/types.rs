//! Gerrit REST API response and request types.
//!
//! These types represent the JSON bodies of the Gerrit REST API (after the
//! `)]}'` guard line is stripped). Required fields are required here too, so a
//! response of the wrong shape fails to deserialize and is reported as
//! malformed instead of flowing on as half-empty data.

use std::collections::BTreeMap;

use gerrit_review_core::CommentRange;
use serde::{Deserialize, Serialize};

// =============================================================================
// Accounts
// =============================================================================

/// Gerrit `AccountInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(rename = "_account_id", default)]
    pub account_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl AccountInfo {
    /// Best human-readable label for the account.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.username.clone())
            .or_else(|| self.email.clone())
            .or_else(|| self.account_id.map(|id| format!("account {}", id)))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// =============================================================================
// Changes and revisions
// =============================================================================

/// Gerrit `ChangeInfo` as returned by `/changes/{id}/detail?o=ALL_REVISIONS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// `project~branch~Change-Id` triplet
    #[serde(default)]
    pub id: Option<String>,
    pub project: String,
    pub branch: String,
    #[serde(default)]
    pub change_id: Option<String>,
    pub subject: String,
    pub status: String,
    #[serde(default)]
    pub owner: Option<AccountInfo>,
    #[serde(rename = "_number", default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub current_revision: Option<String>,
    /// Keyed by commit sha
    #[serde(default)]
    pub revisions: BTreeMap<String, RevisionInfo>,
}

/// Gerrit `RevisionInfo` (patchset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionInfo {
    #[serde(rename = "_number")]
    pub number: u32,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(rename = "ref", default)]
    pub ref_name: Option<String>,
}

// =============================================================================
// Files and diffs
// =============================================================================

/// Gerrit `FileInfo` from `/revisions/{rev}/files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// `A`, `D`, `R`, `C`, `W`; absent means modified
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub lines_inserted: u64,
    #[serde(default)]
    pub lines_deleted: u64,
    #[serde(default)]
    pub size_delta: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub old_sha: Option<String>,
    #[serde(default)]
    pub new_sha: Option<String>,
}

/// Gerrit `DiffInfo` from `/revisions/{rev}/files/{path}/diff`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffInfo {
    #[serde(default)]
    pub meta_a: Option<DiffFileMetaInfo>,
    #[serde(default)]
    pub meta_b: Option<DiffFileMetaInfo>,
    #[serde(default)]
    pub change_type: Option<String>,
    #[serde(default)]
    pub content: Vec<DiffContent>,
    #[serde(default)]
    pub binary: bool,
}

/// One side of a `DiffInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffFileMetaInfo {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub lines: Option<u64>,
}

/// Gerrit `DiffContent` chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffContent {
    /// Lines only in side A (deleted)
    #[serde(default)]
    pub a: Option<Vec<String>>,
    /// Lines only in side B (inserted)
    #[serde(default)]
    pub b: Option<Vec<String>>,
    /// Lines common to both sides
    #[serde(default)]
    pub ab: Option<Vec<String>>,
    /// Common lines left out of the response
    #[serde(default)]
    pub skip: Option<u64>,
}

// =============================================================================
// Comments
// =============================================================================

/// Gerrit `CommentInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub patch_set: Option<u32>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub author: Option<AccountInfo>,
    #[serde(default)]
    pub unresolved: Option<bool>,
}

// =============================================================================
// Review
// =============================================================================

/// Gerrit `CommentInput` inside a `ReviewInput`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<CommentRange>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<bool>,
}

/// Gerrit `ReviewInput` body for `POST /revisions/{rev}/review`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<BTreeMap<String, Vec<CommentInput>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<String>,
}

/// Gerrit `ReviewResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewResultInfo {
    #[serde(default)]
    pub labels: BTreeMap<String, i32>,
    #[serde(default)]
    pub ready: Option<bool>,
}
