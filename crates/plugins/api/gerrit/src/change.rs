//! Change aggregation: detail, files, diffs and comments of one patchset
//! merged into a single [`ChangeView`].

use std::collections::BTreeMap;

use gerrit_review_core::{
    ChangeView, CommentFetch, Error, ExclusionFilter, FileDiff, FileStatus, InlineComment,
    PatchsetRef, PatchsetSelector, PatchsetSide, Result,
};
use tracing::{debug, warn};

use crate::api::GerritApi;
use crate::diff::render_unified;
use crate::types::{ChangeInfo, CommentInfo, FileInfo};

/// Gerrit lists pseudo files (`/COMMIT_MSG`, `/MERGE_LIST`, `/PATCHSET_LEVEL`)
/// next to real ones; they all start with a slash.
pub fn is_magic_path(path: &str) -> bool {
    path.starts_with('/')
}

/// A patchset resolved against the change's revision map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRevision {
    pub sha: String,
    pub number: u32,
}

/// Highest patchset number of the change.
pub fn current_patchset(change: &ChangeInfo) -> u32 {
    change
        .revisions
        .values()
        .map(|r| r.number)
        .max()
        .unwrap_or_default()
}

/// Resolve a patchset selector to a revision sha.
///
/// `Current` picks the highest `_number`; a number matches `_number`; a full
/// commit sha matches a revision key.
pub fn resolve_revision(
    change_id: &str,
    change: &ChangeInfo,
    selector: &PatchsetSelector,
    side: Option<PatchsetSide>,
) -> Result<ResolvedRevision> {
    let found = match selector {
        PatchsetSelector::Current => change.revisions.iter().max_by_key(|(_, r)| r.number),
        PatchsetSelector::Number(raw) => match raw.parse::<u32>() {
            Ok(number) => change.revisions.iter().find(|(_, r)| r.number == number),
            Err(_) => change.revisions.get_key_value(raw.as_str()),
        },
    };

    match found {
        Some((sha, revision)) => Ok(ResolvedRevision {
            sha: sha.clone(),
            number: revision.number,
        }),
        None => {
            let mut available: Vec<u32> = change.revisions.values().map(|r| r.number).collect();
            available.sort_unstable();
            Err(Error::PatchsetNotFound {
                change_id: change_id.to_string(),
                patchset: selector.to_string(),
                side,
                available: available.iter().map(u32::to_string).collect(),
            })
        }
    }
}

/// Map Gerrit's per-file status letter.
pub fn map_status(info: &FileInfo) -> FileStatus {
    match info.status.as_deref() {
        Some("A") | Some("C") => FileStatus::Added,
        Some("D") => FileStatus::Deleted,
        Some("R") => FileStatus::Renamed,
        _ => FileStatus::Modified,
    }
}

/// File entry from Gerrit metadata, before any diff is attached.
pub fn file_entry(path: &str, info: &FileInfo) -> FileDiff {
    let status = map_status(info);
    FileDiff {
        path: path.to_string(),
        old_path: match status {
            FileStatus::Renamed => info.old_path.clone(),
            _ => None,
        },
        status,
        insertions: info.lines_inserted,
        deletions: info.lines_deleted,
        diff_content: None,
        binary: info.binary,
    }
}

/// Fetch and render the diff of one file. Binary files are left alone and a
/// 404 leaves the entry without diff text.
pub(crate) async fn attach_diff(
    api: &GerritApi<'_>,
    change_id: &str,
    revision: &str,
    base: Option<&str>,
    mut file: FileDiff,
) -> Result<FileDiff> {
    if file.binary {
        return Ok(file);
    }

    match api.file_diff(change_id, revision, &file.path, base).await {
        Ok(info) => {
            if info.binary {
                file.binary = true;
                return Ok(file);
            }
            if let Some(rendered) =
                render_unified(&file.path, file.old_path.as_deref(), file.status, &info)
            {
                file.insertions = rendered.insertions;
                file.deletions = rendered.deletions;
                file = file.with_diff(Some(rendered.text));
            }
            Ok(file)
        }
        Err(Error::Api { status: 404, .. }) => {
            warn!(path = %file.path, revision, "Diff not available, omitting content");
            Ok(file)
        }
        Err(e) => Err(e),
    }
}

/// Flatten Gerrit's path-keyed comment map, sorted by (path, line, timestamp).
pub fn flatten_comments(
    comments: BTreeMap<String, Vec<CommentInfo>>,
    patchset: u32,
) -> Vec<InlineComment> {
    let mut flattened: Vec<InlineComment> = comments
        .into_iter()
        .flat_map(|(path, list)| {
            list.into_iter().map(move |c| InlineComment {
                file_path: c.path.unwrap_or_else(|| path.clone()),
                line: c.line,
                author: c
                    .author
                    .map(|a| a.label())
                    .unwrap_or_else(|| "unknown".to_string()),
                message: c.message.unwrap_or_default(),
                timestamp: c.updated.unwrap_or_default(),
                patchset_number: Some(c.patch_set.unwrap_or(patchset)),
                unresolved: c.unresolved.unwrap_or(false),
            })
        })
        .collect();

    flattened.sort_by(|a, b| {
        (&a.file_path, a.line, &a.timestamp).cmp(&(&b.file_path, b.line, &b.timestamp))
    });
    flattened
}

/// Build the view of one change at one patchset.
pub async fn fetch_change(
    api: &GerritApi<'_>,
    excluded: &ExclusionFilter,
    target: &PatchsetRef,
    include_comments: bool,
) -> Result<ChangeView> {
    let change_id = target.change_id.as_str();
    let change = api.change_detail(change_id).await?;
    let revision = resolve_revision(change_id, &change, &target.patchset, None)?;
    debug!(
        change_id,
        patchset = revision.number,
        revision = %revision.sha,
        "Resolved change revision"
    );

    let entries: Vec<FileDiff> = api
        .revision_files(change_id, &revision.sha)
        .await?
        .iter()
        .filter(|(path, _)| !is_magic_path(path))
        .map(|(path, info)| file_entry(path, info))
        .collect();

    let (kept, excluded_files) = excluded.partition(entries);
    if !excluded_files.is_empty() {
        debug!(count = excluded_files.len(), "Excluded files from change view");
    }

    let mut files = Vec::with_capacity(kept.len());
    for file in kept {
        files.push(attach_diff(api, change_id, &revision.sha, None, file).await?);
    }

    let comments = if include_comments {
        match api.revision_comments(change_id, &revision.sha).await {
            Ok(map) => CommentFetch::Fetched(flatten_comments(map, revision.number)),
            Err(e) => {
                warn!(change_id, error = %e, "Failed to fetch inline comments");
                CommentFetch::Failed(e.to_string())
            }
        }
    } else {
        CommentFetch::NotRequested
    };

    let view = ChangeView {
        change_id: change
            .change_id
            .clone()
            .unwrap_or_else(|| change_id.to_string()),
        change_number: change.number,
        project: change.project.clone(),
        branch: change.branch.clone(),
        subject: change.subject.clone(),
        status: change.status.clone(),
        owner: change
            .owner
            .as_ref()
            .map(|o| o.label())
            .unwrap_or_else(|| "unknown".to_string()),
        current_patchset: current_patchset(&change),
        patchset: revision.number,
        revision: revision.sha,
        files,
        excluded_files,
        inline_comments: None,
        comment_fetch_error: None,
    };

    Ok(view.with_comments(comments))
}
