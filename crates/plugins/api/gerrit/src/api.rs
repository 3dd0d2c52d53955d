//! Typed Gerrit REST endpoints used by the engine.

use std::borrow::Cow;
use std::collections::BTreeMap;

use gerrit_review_core::{Error, Result};

use crate::auth::Session;
use crate::client::GerritClient;
use crate::types::{ChangeInfo, CommentInfo, DiffInfo, FileInfo, ReviewInput, ReviewResultInfo};

/// Lines of context around each changed region in file diffs.
const DIFF_CONTEXT: &str = "3";

/// Change id as a single raw path segment.
///
/// Gerrit's own `id` field is already percent-encoded
/// (`my%2Fproject~main~I1`); decoding first keeps the client's segment
/// encoding from escaping the `%` a second time.
pub fn change_segment(change_id: &str) -> Result<Cow<'_, str>> {
    urlencoding::decode(change_id)
        .map_err(|e| Error::InvalidInput(format!("Invalid change id '{}': {}", change_id, e)))
}

/// Gerrit endpoints bound to an authenticated session.
#[derive(Debug, Clone, Copy)]
pub struct GerritApi<'a> {
    client: &'a GerritClient,
    session: &'a Session,
}

impl<'a> GerritApi<'a> {
    pub fn new(client: &'a GerritClient, session: &'a Session) -> Self {
        Self { client, session }
    }

    /// `GET /changes/{id}/detail?o=ALL_REVISIONS`
    pub async fn change_detail(&self, change_id: &str) -> Result<ChangeInfo> {
        let id = change_segment(change_id)?;
        self.client
            .get_json(
                self.session,
                &["changes", &id, "detail"],
                &[("o", "ALL_REVISIONS")],
            )
            .await
            .map_err(|e| match e {
                Error::Api { status: 404, .. } => Error::ChangeNotFound(change_id.to_string()),
                other => other,
            })
    }

    /// `GET /changes/{id}/revisions/{rev}/files`, keyed by path.
    pub async fn revision_files(
        &self,
        change_id: &str,
        revision: &str,
    ) -> Result<BTreeMap<String, FileInfo>> {
        let id = change_segment(change_id)?;
        self.client
            .get_json(
                self.session,
                &["changes", &id, "revisions", revision, "files"],
                &[],
            )
            .await
    }

    /// `GET /changes/{id}/revisions/{rev}/files?base={base}`: files that
    /// differ between `base` and `revision`, as Gerrit computes it.
    pub async fn revision_files_against(
        &self,
        change_id: &str,
        revision: &str,
        base: &str,
    ) -> Result<BTreeMap<String, FileInfo>> {
        let id = change_segment(change_id)?;
        self.client
            .get_json(
                self.session,
                &["changes", &id, "revisions", revision, "files"],
                &[("base", base)],
            )
            .await
    }

    /// `GET /changes/{id}/revisions/{rev}/files/{path}/diff`, against the
    /// parent commit or, with `base`, against another revision.
    pub async fn file_diff(
        &self,
        change_id: &str,
        revision: &str,
        path: &str,
        base: Option<&str>,
    ) -> Result<DiffInfo> {
        let id = change_segment(change_id)?;
        let mut query = vec![("context", DIFF_CONTEXT)];
        if let Some(base) = base {
            query.push(("base", base));
        }
        self.client
            .get_json(
                self.session,
                &["changes", &id, "revisions", revision, "files", path, "diff"],
                &query,
            )
            .await
    }

    /// `GET /changes/{id}/revisions/{rev}/comments`, keyed by file path.
    pub async fn revision_comments(
        &self,
        change_id: &str,
        revision: &str,
    ) -> Result<BTreeMap<String, Vec<CommentInfo>>> {
        let id = change_segment(change_id)?;
        self.client
            .get_json(
                self.session,
                &["changes", &id, "revisions", revision, "comments"],
                &[],
            )
            .await
    }

    /// `POST /changes/{id}/revisions/{rev}/review`
    pub async fn post_review(
        &self,
        change_id: &str,
        revision: &str,
        input: &ReviewInput,
    ) -> Result<ReviewResultInfo> {
        let id = change_segment(change_id)?;
        self.client
            .post_json(
                self.session,
                &["changes", &id, "revisions", revision, "review"],
                input,
            )
            .await
            .map_err(|e| match e {
                Error::Api { status: 404, .. } => Error::ChangeNotFound(change_id.to_string()),
                other => other,
            })
    }
}
