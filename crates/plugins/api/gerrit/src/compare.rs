//! Patchset comparison.
//!
//! Each patchset's file list is relative to the change's parent commit, so
//! two lists are reconciled by path to find what differs between the
//! patchsets themselves. Blob shas decide whether a shared path changed;
//! servers that omit them are asked for the target's file list against the
//! base revision instead. Diff text then comes straight from Gerrit using
//! the base revision as `base`.

use std::collections::{BTreeMap, BTreeSet};

use gerrit_review_core::{
    filter_files, ExclusionFilter, FileDiff, FileStatus, PatchsetDiffResult, PatchsetSelector,
    PatchsetSide, Result,
};
use tracing::debug;

use crate::api::GerritApi;
use crate::change::{attach_diff, is_magic_path, map_status, resolve_revision};
use crate::types::FileInfo;

/// Whether two file entries describe the same content.
///
/// Blob shas decide when both sides report them. Otherwise the answer comes
/// from `changed`, the paths Gerrit lists for the target against the base;
/// without that listing the entries are treated as different.
pub fn same_content(
    path: &str,
    base: &FileInfo,
    target: &FileInfo,
    changed: Option<&BTreeSet<String>>,
) -> bool {
    match (&base.new_sha, &target.new_sha) {
        (Some(a), Some(b)) => a == b,
        _ => changed.is_some_and(|changed| !changed.contains(path)),
    }
}

/// Whether any path shared by both lists lacks a blob sha on either side.
pub fn needs_base_listing(
    base: &BTreeMap<String, FileInfo>,
    target: &BTreeMap<String, FileInfo>,
) -> bool {
    base.iter().any(|(path, before)| {
        target
            .get(path)
            .is_some_and(|after| before.new_sha.is_none() || after.new_sha.is_none())
    })
}

fn entry(path: &str, old_path: Option<String>, status: FileStatus, binary: bool) -> FileDiff {
    FileDiff {
        path: path.to_string(),
        old_path,
        status,
        insertions: 0,
        deletions: 0,
        diff_content: None,
        binary,
    }
}

/// Reconcile two path-keyed file lists into the files that differ, sorted
/// by path. Line counts are left at zero until a diff is attached.
pub fn reconcile(
    base: &BTreeMap<String, FileInfo>,
    target: &BTreeMap<String, FileInfo>,
    changed: Option<&BTreeSet<String>>,
) -> Vec<FileDiff> {
    let mut base_only: BTreeSet<&str> = base
        .keys()
        .filter(|path| !target.contains_key(*path))
        .map(String::as_str)
        .collect();

    let mut files = Vec::new();
    for (path, info) in target {
        match base.get(path) {
            None => {
                let renamed_from = info
                    .old_path
                    .as_deref()
                    .filter(|old| map_status(info) == FileStatus::Renamed && base_only.remove(old));
                match renamed_from {
                    Some(old) => files.push(entry(
                        path,
                        Some(old.to_string()),
                        FileStatus::Renamed,
                        info.binary,
                    )),
                    None => files.push(entry(path, None, FileStatus::Added, info.binary)),
                }
            }
            Some(before) if same_content(path, before, info, changed) => {}
            Some(before) => {
                let status = match (map_status(before), map_status(info)) {
                    (_, FileStatus::Deleted) => FileStatus::Deleted,
                    (FileStatus::Deleted, _) => FileStatus::Added,
                    _ => FileStatus::Modified,
                };
                files.push(entry(path, None, status, before.binary || info.binary));
            }
        }
    }

    for path in base_only {
        let binary = base.get(path).is_some_and(|info| info.binary);
        files.push(entry(path, None, FileStatus::Deleted, binary));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Files that differ between two patchsets of a change.
pub async fn fetch_patchset_diff(
    api: &GerritApi<'_>,
    excluded: &ExclusionFilter,
    change_id: &str,
    base_patchset: &str,
    target_patchset: &str,
    file_path: Option<&str>,
) -> Result<PatchsetDiffResult> {
    let mut result = PatchsetDiffResult::empty(change_id, base_patchset, target_patchset);
    if base_patchset.trim() == target_patchset.trim() {
        debug!(change_id, patchset = base_patchset, "Identical patchsets, nothing to compare");
        return Ok(result);
    }

    let change = api.change_detail(change_id).await?;
    let base = resolve_revision(
        change_id,
        &change,
        &PatchsetSelector::parse(Some(base_patchset)),
        Some(PatchsetSide::Base),
    )?;
    let target = resolve_revision(
        change_id,
        &change,
        &PatchsetSelector::parse(Some(target_patchset)),
        Some(PatchsetSide::Target),
    )?;
    result.base_revision = Some(base.sha.clone());
    result.target_revision = Some(target.sha.clone());

    if base.sha == target.sha {
        debug!(change_id, revision = %base.sha, "Both sides resolve to the same revision");
        return Ok(result);
    }

    let without_magic = |files: BTreeMap<String, FileInfo>| -> BTreeMap<String, FileInfo> {
        files
            .into_iter()
            .filter(|(path, _)| !is_magic_path(path))
            .collect()
    };
    let base_files = without_magic(api.revision_files(change_id, &base.sha).await?);
    let target_files = without_magic(api.revision_files(change_id, &target.sha).await?);

    let changed = if needs_base_listing(&base_files, &target_files) {
        debug!(change_id, "Blob shas missing, listing target files against base");
        let listed = api
            .revision_files_against(change_id, &target.sha, &base.sha)
            .await?;
        Some(
            listed
                .into_keys()
                .filter(|path| !is_magic_path(path))
                .collect::<BTreeSet<_>>(),
        )
    } else {
        None
    };

    let mut entries = reconcile(&base_files, &target_files, changed.as_ref());
    if let Some(wanted) = file_path {
        entries.retain(|f| f.path == wanted || f.old_path.as_deref() == Some(wanted));
    }
    let entries = filter_files(entries, excluded);
    debug!(
        change_id,
        base = base.number,
        target = target.number,
        files = entries.len(),
        "Reconciled patchset file lists"
    );

    for file in entries {
        result
            .files
            .push(attach_diff(api, change_id, &target.sha, Some(&base.sha), file).await?);
    }
    result.files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(status: Option<&str>, sha: Option<&str>, size: i64) -> FileInfo {
        FileInfo {
            status: status.map(str::to_string),
            new_sha: sha.map(str::to_string),
            size,
            ..Default::default()
        }
    }

    fn files(entries: &[(&str, FileInfo)]) -> BTreeMap<String, FileInfo> {
        entries
            .iter()
            .map(|(p, i)| (p.to_string(), i.clone()))
            .collect()
    }

    fn summary(files: &[FileDiff]) -> Vec<(&str, FileStatus)> {
        files.iter().map(|f| (f.path.as_str(), f.status)).collect()
    }

    #[test]
    fn test_target_only_is_added_base_only_is_deleted() {
        let base = files(&[
            ("x.py", info(None, Some("s1"), 10)),
            ("gone.py", info(Some("A"), Some("s2"), 5)),
        ]);
        let target = files(&[
            ("x.py", info(None, Some("s1"), 10)),
            ("y.py", info(Some("A"), Some("s3"), 7)),
        ]);

        assert_eq!(
            summary(&reconcile(&base, &target, None)),
            vec![("gone.py", FileStatus::Deleted), ("y.py", FileStatus::Added)]
        );
    }

    #[test]
    fn test_differing_content_is_modified() {
        let base = files(&[("a.rs", info(None, Some("s1"), 10))]);
        let target = files(&[("a.rs", info(None, Some("s2"), 10))]);
        assert_eq!(
            summary(&reconcile(&base, &target, None)),
            vec![("a.rs", FileStatus::Modified)]
        );
    }

    #[test]
    fn test_base_listing_decides_without_sha() {
        // Same size and line counts on both sides; only the listing knows
        // that a.rs changed.
        let base = files(&[("a.rs", info(None, None, 10)), ("b.rs", info(None, None, 3))]);
        let target = files(&[("a.rs", info(None, None, 10)), ("b.rs", info(None, None, 3))]);
        assert!(needs_base_listing(&base, &target));

        let changed: BTreeSet<String> = ["a.rs".to_string()].into();
        assert_eq!(
            summary(&reconcile(&base, &target, Some(&changed))),
            vec![("a.rs", FileStatus::Modified)]
        );
    }

    #[test]
    fn test_missing_sha_without_listing_counts_as_changed() {
        let base = files(&[("a.rs", info(Some("A"), None, 4))]);
        let target = files(&[("a.rs", info(Some("A"), None, 4))]);
        assert_eq!(
            summary(&reconcile(&base, &target, None)),
            vec![("a.rs", FileStatus::Modified)]
        );
    }

    #[test]
    fn test_shas_present_need_no_listing() {
        let base = files(&[("a.rs", info(None, Some("s1"), 10))]);
        let target = files(&[
            ("a.rs", info(None, Some("s2"), 10)),
            ("new.rs", info(Some("A"), None, 1)),
        ]);
        assert!(!needs_base_listing(&base, &target));
    }

    #[test]
    fn test_deletion_and_restoration_between_patchsets() {
        let base = files(&[
            ("removed.rs", info(None, Some("s1"), 10)),
            ("restored.rs", info(Some("D"), None, 0)),
        ]);
        let target = files(&[
            ("removed.rs", info(Some("D"), None, 0)),
            ("restored.rs", info(None, Some("s2"), 4)),
        ]);
        assert_eq!(
            summary(&reconcile(&base, &target, None)),
            vec![
                ("removed.rs", FileStatus::Deleted),
                ("restored.rs", FileStatus::Added)
            ]
        );
    }

    #[test]
    fn test_reported_rename_becomes_single_entry() {
        let base = files(&[("old/name.rs", info(Some("A"), Some("s1"), 10))]);
        let mut renamed = info(Some("R"), Some("s1"), 10);
        renamed.old_path = Some("old/name.rs".to_string());
        let target = files(&[("new/name.rs", renamed)]);

        let result = reconcile(&base, &target, None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].status, FileStatus::Renamed);
        assert_eq!(result[0].path, "new/name.rs");
        assert_eq!(result[0].old_path.as_deref(), Some("old/name.rs"));
    }

    #[test]
    fn test_rename_from_path_still_in_base_is_added() {
        let base = files(&[("keep.rs", info(None, Some("s1"), 10))]);
        let mut renamed = info(Some("R"), Some("s2"), 10);
        renamed.old_path = Some("keep.rs".to_string());
        let target = files(&[("keep.rs", info(None, Some("s1"), 10)), ("moved.rs", renamed)]);

        assert_eq!(
            summary(&reconcile(&base, &target, None)),
            vec![("moved.rs", FileStatus::Added)]
        );
    }

    #[test]
    fn test_identical_lists_reconcile_to_nothing() {
        let list = files(&[("a.rs", info(None, Some("s1"), 1))]);
        assert!(reconcile(&list, &list, None).is_empty());
    }
}
