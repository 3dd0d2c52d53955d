//! Review submission.

use std::collections::BTreeMap;

use gerrit_review_core::{
    CommentRange, Error, PatchsetRef, Result, ReviewComment, ReviewRequest, ReviewResult,
};
use tracing::info;

use crate::api::GerritApi;
use crate::change::resolve_revision;
use crate::types::{CommentInput, ReviewInput};

const NOTIFY_VALUES: [&str; 4] = ["NONE", "OWNER", "OWNER_REVIEWERS", "ALL"];

/// Validate draft comments and group them by file path.
pub fn build_review_comments(
    comments: &[ReviewComment],
) -> Result<BTreeMap<String, Vec<CommentInput>>> {
    let mut grouped: BTreeMap<String, Vec<CommentInput>> = BTreeMap::new();

    for (index, comment) in comments.iter().enumerate() {
        let invalid = |reason: &str| Error::InvalidInput(format!("comment {}: {}", index + 1, reason));

        let path = comment
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("path is required"))?;
        let message = comment
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| invalid("message is required"))?;

        if let Some(line) = comment.line {
            if line < 1 {
                return Err(invalid(&format!("line must be >= 1, got {}", line)));
            }
        }

        let range = comment
            .range
            .as_ref()
            .map(|raw| parse_range(raw).map_err(|reason| invalid(&reason)))
            .transpose()?;

        grouped.entry(path.to_string()).or_default().push(CommentInput {
            line: comment.line,
            range,
            message: message.to_string(),
            unresolved: comment.unresolved,
        });
    }

    Ok(grouped)
}

fn parse_range(raw: &serde_json::Value) -> std::result::Result<CommentRange, String> {
    let range: CommentRange =
        serde_json::from_value(raw.clone()).map_err(|e| format!("invalid range: {}", e))?;
    if range.start_line < 1 || range.end_line < 1 {
        return Err("invalid range: lines must be >= 1".to_string());
    }
    if range.start_line > range.end_line {
        return Err(format!(
            "invalid range: start_line {} is after end_line {}",
            range.start_line, range.end_line
        ));
    }
    if range.start_character < 0 || range.end_character < 0 {
        return Err("invalid range: characters must not be negative".to_string());
    }
    Ok(range)
}

fn normalize_notify(notify: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = notify.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let upper = raw.to_ascii_uppercase();
    if NOTIFY_VALUES.contains(&upper.as_str()) {
        Ok(Some(upper))
    } else {
        Err(Error::InvalidInput(format!(
            "notify must be one of {}, got '{}'",
            NOTIFY_VALUES.join(", "),
            raw
        )))
    }
}

/// Build the Gerrit request body; fails before any network call.
pub fn build_review_input(review: &ReviewRequest) -> Result<ReviewInput> {
    if review.is_empty() {
        return Err(Error::InvalidInput(
            "review needs at least a message, a label or a comment".to_string(),
        ));
    }

    let comments = build_review_comments(&review.comments)?;
    Ok(ReviewInput {
        message: review
            .message
            .clone()
            .filter(|m| !m.trim().is_empty()),
        labels: (!review.labels.is_empty()).then(|| review.labels.clone()),
        comments: (!comments.is_empty()).then_some(comments),
        notify: normalize_notify(review.notify.as_deref())?,
    })
}

/// Post a review on a patchset (`None` selects the current one).
pub async fn submit_review(
    api: &GerritApi<'_>,
    target: &PatchsetRef,
    review: &ReviewRequest,
) -> Result<ReviewResult> {
    let input = build_review_input(review)?;

    let change_id = target.change_id.as_str();
    let change = api.change_detail(change_id).await?;
    let revision = resolve_revision(change_id, &change, &target.patchset, None)?;

    let applied = api.post_review(change_id, &revision.sha, &input).await?;
    info!(
        change_id,
        patchset = revision.number,
        labels = applied.labels.len(),
        comments = review.comments.len(),
        "Review posted"
    );

    Ok(ReviewResult {
        change_id: change_id.to_string(),
        revision: revision.sha,
        patchset: revision.number,
        labels: applied.labels,
    })
}
