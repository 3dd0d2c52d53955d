//! Provider trait for code-review backends.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChangeView, PatchsetDiffResult, ReviewRequest, ReviewResult};

/// Read (and review) access to a code-review server.
///
/// Implementations must be safe for concurrent use; the tool surface shares a
/// single provider across calls.
#[async_trait]
pub trait ReviewProvider: Send + Sync {
    /// Get the provider name (e.g., "gerrit")
    fn provider_name(&self) -> &'static str;

    /// Assemble metadata, files, diffs and (optionally) inline comments of a
    /// change at one patchset. `None` selects the current patchset.
    async fn fetch_change(
        &self,
        change_id: &str,
        patchset_number: Option<&str>,
        include_comments: bool,
    ) -> Result<ChangeView>;

    /// Files that differ between two patchsets, optionally restricted to a
    /// single path.
    async fn fetch_patchset_diff(
        &self,
        change_id: &str,
        base_patchset: &str,
        target_patchset: &str,
        file_path: Option<&str>,
    ) -> Result<PatchsetDiffResult>;

    /// Post a review (message, votes, inline comments) on a patchset.
    async fn submit_review(
        &self,
        change_id: &str,
        patchset_number: Option<&str>,
        review: ReviewRequest,
    ) -> Result<ReviewResult>;
}
