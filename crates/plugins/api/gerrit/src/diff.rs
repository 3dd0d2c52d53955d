//! Rendering of Gerrit `DiffInfo` into unified diff text.
//!
//! Gerrit returns diffs as a list of chunks (`ab` common lines, `a` removed,
//! `b` added, `skip` for common lines it left out). Consecutive chunks form
//! one hunk; a `skip` chunk ends the hunk and advances both line counters.

use gerrit_review_core::FileStatus;

use crate::types::{DiffContent, DiffInfo};

const DEV_NULL: &str = "/dev/null";

/// Unified diff text plus the line counts it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiff {
    pub text: String,
    pub insertions: u64,
    pub deletions: u64,
}

#[derive(Default)]
struct Hunk {
    old_start: u64,
    old_len: u64,
    new_start: u64,
    new_len: u64,
    lines: Vec<String>,
}

impl Hunk {
    fn starting_at(old_line: u64, new_line: u64) -> Self {
        Self {
            old_start: old_line,
            new_start: new_line,
            ..Default::default()
        }
    }

    fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@",
            range(self.old_start, self.old_len),
            range(self.new_start, self.new_len)
        )
    }
}

/// Unified range notation; an empty side points at the line before it.
fn range(start: u64, len: u64) -> String {
    if len == 0 {
        format!("{},0", start.saturating_sub(1))
    } else {
        format!("{},{}", start, len)
    }
}

/// Render a Gerrit diff. Returns `None` for binary files and for diffs
/// without any changed line.
pub fn render_unified(
    path: &str,
    old_path: Option<&str>,
    status: FileStatus,
    diff: &DiffInfo,
) -> Option<RenderedDiff> {
    if diff.binary {
        return None;
    }

    let hunks = collect_hunks(&diff.content);
    if hunks.is_empty() {
        return None;
    }

    let change_type = diff.change_type.as_deref().unwrap_or_default();
    let old_name = if status == FileStatus::Added || change_type == "ADDED" {
        DEV_NULL.to_string()
    } else {
        let name = diff
            .meta_a
            .as_ref()
            .map(|m| m.name.as_str())
            .or(old_path)
            .unwrap_or(path);
        format!("a/{}", name)
    };
    let new_name = if status == FileStatus::Deleted || change_type == "DELETED" {
        DEV_NULL.to_string()
    } else {
        let name = diff.meta_b.as_ref().map(|m| m.name.as_str()).unwrap_or(path);
        format!("b/{}", name)
    };

    let mut text = format!("--- {}\n+++ {}\n", old_name, new_name);
    let mut insertions = 0;
    let mut deletions = 0;
    for hunk in &hunks {
        text.push_str(&hunk.header());
        text.push('\n');
        for line in &hunk.lines {
            match line.as_bytes().first() {
                Some(b'+') => insertions += 1,
                Some(b'-') => deletions += 1,
                _ => {}
            }
            text.push_str(line);
            text.push('\n');
        }
    }

    Some(RenderedDiff {
        text,
        insertions,
        deletions,
    })
}

fn collect_hunks(content: &[DiffContent]) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut old_line = 1;
    let mut new_line = 1;
    let mut current: Option<Hunk> = None;

    for chunk in content {
        if let Some(skip) = chunk.skip {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            old_line += skip;
            new_line += skip;
            continue;
        }

        let hunk = current.get_or_insert_with(|| Hunk::starting_at(old_line, new_line));
        for line in chunk.ab.iter().flatten() {
            hunk.lines.push(format!(" {}", line));
            hunk.old_len += 1;
            hunk.new_len += 1;
        }
        for line in chunk.a.iter().flatten() {
            hunk.lines.push(format!("-{}", line));
            hunk.old_len += 1;
        }
        for line in chunk.b.iter().flatten() {
            hunk.lines.push(format!("+{}", line));
            hunk.new_len += 1;
        }

        let common = chunk.ab.as_ref().map_or(0, Vec::len) as u64;
        old_line += common + chunk.a.as_ref().map_or(0, Vec::len) as u64;
        new_line += common + chunk.b.as_ref().map_or(0, Vec::len) as u64;
    }

    if let Some(hunk) = current {
        hunks.push(hunk);
    }

    hunks
        .into_iter()
        .filter(|h| h.lines.iter().any(|l| !l.starts_with(' ')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiffFileMetaInfo;

    fn lines(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    fn meta(name: &str) -> Option<DiffFileMetaInfo> {
        Some(DiffFileMetaInfo {
            name: name.to_string(),
            content_type: None,
            lines: None,
        })
    }

    #[test]
    fn test_modified_file_with_skip_splits_hunks() {
        let diff = DiffInfo {
            meta_a: meta("src/lib.rs"),
            meta_b: meta("src/lib.rs"),
            change_type: Some("MODIFIED".to_string()),
            content: vec![
                DiffContent {
                    ab: lines(&["fn a() {}"]),
                    ..Default::default()
                },
                DiffContent {
                    a: lines(&["old"]),
                    b: lines(&["new", "newer"]),
                    ..Default::default()
                },
                DiffContent {
                    skip: Some(10),
                    ..Default::default()
                },
                DiffContent {
                    ab: lines(&["ctx"]),
                    b: None,
                    a: lines(&["gone"]),
                    ..Default::default()
                },
            ],
            binary: false,
        };

        let rendered = render_unified("src/lib.rs", None, FileStatus::Modified, &diff).unwrap();
        assert_eq!(
            rendered.text,
            "--- a/src/lib.rs\n+++ b/src/lib.rs\n\
             @@ -1,2 +1,3 @@\n fn a() {}\n-old\n+new\n+newer\n\
             @@ -13,2 +14,1 @@\n ctx\n-gone\n"
        );
        assert_eq!(rendered.insertions, 2);
        assert_eq!(rendered.deletions, 2);
    }

    #[test]
    fn test_added_file_uses_dev_null() {
        let diff = DiffInfo {
            meta_b: meta("y.py"),
            change_type: Some("ADDED".to_string()),
            content: vec![DiffContent {
                b: lines(&["print('y')"]),
                ..Default::default()
            }],
            ..Default::default()
        };

        let rendered = render_unified("y.py", None, FileStatus::Added, &diff).unwrap();
        assert_eq!(
            rendered.text,
            "--- /dev/null\n+++ b/y.py\n@@ -0,0 +1,1 @@\n+print('y')\n"
        );
        assert_eq!(rendered.insertions, 1);
        assert_eq!(rendered.deletions, 0);
    }

    #[test]
    fn test_deleted_file_uses_dev_null() {
        let diff = DiffInfo {
            meta_a: meta("old.txt"),
            change_type: Some("DELETED".to_string()),
            content: vec![DiffContent {
                a: lines(&["a", "b"]),
                ..Default::default()
            }],
            ..Default::default()
        };

        let rendered = render_unified("old.txt", None, FileStatus::Deleted, &diff).unwrap();
        assert!(rendered.text.starts_with("--- a/old.txt\n+++ /dev/null\n@@ -1,2 +0,0 @@\n"));
        assert_eq!(rendered.deletions, 2);
    }

    #[test]
    fn test_renamed_file_names_both_sides() {
        let diff = DiffInfo {
            content: vec![DiffContent {
                a: lines(&["x"]),
                b: lines(&["y"]),
                ..Default::default()
            }],
            ..Default::default()
        };

        let rendered =
            render_unified("new/name.rs", Some("old/name.rs"), FileStatus::Renamed, &diff)
                .unwrap();
        assert!(rendered.text.starts_with("--- a/old/name.rs\n+++ b/new/name.rs\n"));
    }

    #[test]
    fn test_binary_and_unchanged_render_nothing() {
        let binary = DiffInfo {
            binary: true,
            ..Default::default()
        };
        assert!(render_unified("logo.png", None, FileStatus::Modified, &binary).is_none());

        let unchanged = DiffInfo {
            content: vec![DiffContent {
                ab: lines(&["same"]),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(render_unified("a.txt", None, FileStatus::Modified, &unchanged).is_none());
    }
}
