//! Tool handlers.
//!
//! Decodes tool arguments, calls the review provider and renders the result
//! as JSON text.

use std::collections::BTreeMap;
use std::sync::Arc;

use gerrit_review_core::{ReviewComment, ReviewProvider, ReviewRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::protocol::{ToolCallResult, ToolDefinition};

/// Tool handler that executes tools against a review provider.
pub struct ToolHandler {
    provider: Arc<dyn ReviewProvider>,
}

impl ToolHandler {
    pub fn new(provider: Arc<dyn ReviewProvider>) -> Self {
        Self { provider }
    }

    /// Get available tool definitions.
    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "fetch_gerrit_change".to_string(),
                description: "Fetch a Gerrit change with its files, unified diffs and \
                              (optionally) inline comments"
                    .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "change_id": {
                            "type": "string",
                            "description": "Change number, Change-Id or project~branch~Change-Id"
                        },
                        "patchset_number": {
                            "type": ["string", "integer"],
                            "description": "Patchset to view (default: current)"
                        },
                        "include_comments": {
                            "type": "boolean",
                            "description": "Include inline comments (default: true)"
                        }
                    },
                    "required": ["change_id"]
                }),
            },
            ToolDefinition {
                name: "fetch_patchset_diff".to_string(),
                description: "List the files that differ between two patchsets of a change"
                    .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "change_id": {
                            "type": "string",
                            "description": "Change number, Change-Id or project~branch~Change-Id"
                        },
                        "base_patchset": {
                            "type": ["string", "integer"],
                            "description": "Base patchset number or 'current'"
                        },
                        "target_patchset": {
                            "type": ["string", "integer"],
                            "description": "Target patchset number or 'current'"
                        },
                        "file_path": {
                            "type": "string",
                            "description": "Restrict the comparison to this path"
                        }
                    },
                    "required": ["change_id", "base_patchset", "target_patchset"]
                }),
            },
            ToolDefinition {
                name: "submit_gerrit_review".to_string(),
                description: "Post a review message, label votes and inline comments on a \
                              patchset"
                    .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "change_id": {
                            "type": "string",
                            "description": "Change number, Change-Id or project~branch~Change-Id"
                        },
                        "patchset_number": {
                            "type": ["string", "integer"],
                            "description": "Patchset to review (default: current)"
                        },
                        "message": {
                            "type": "string",
                            "description": "Review summary message"
                        },
                        "labels": {
                            "type": "object",
                            "additionalProperties": { "type": "integer" },
                            "description": "Label votes, e.g. {\"Code-Review\": 1}"
                        },
                        "comments": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "path": { "type": "string" },
                                    "line": { "type": "integer", "minimum": 1 },
                                    "range": {
                                        "type": "object",
                                        "properties": {
                                            "start_line": { "type": "integer" },
                                            "start_character": { "type": "integer" },
                                            "end_line": { "type": "integer" },
                                            "end_character": { "type": "integer" }
                                        }
                                    },
                                    "message": { "type": "string" },
                                    "unresolved": { "type": "boolean" }
                                },
                                "required": ["path", "message"]
                            },
                            "description": "Inline comments"
                        },
                        "notify": {
                            "type": "string",
                            "enum": ["NONE", "OWNER", "OWNER_REVIEWERS", "ALL"],
                            "description": "Who gets notified"
                        }
                    },
                    "required": ["change_id"]
                }),
            },
        ]
    }

    /// Execute a tool by name with arguments.
    pub async fn execute(&self, name: &str, arguments: Option<Value>) -> ToolCallResult {
        tracing::debug!(tool = name, provider = self.provider.provider_name(), "Executing tool");
        match name {
            "fetch_gerrit_change" => self.handle_fetch_change(arguments).await,
            "fetch_patchset_diff" => self.handle_fetch_patchset_diff(arguments).await,
            "submit_gerrit_review" => self.handle_submit_review(arguments).await,
            _ => ToolCallResult::error(format!("Unknown tool: {}", name)),
        }
    }

    async fn handle_fetch_change(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: FetchChangeParams = match decode(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let result = self
            .provider
            .fetch_change(
                &params.change_id,
                params.patchset_number.as_deref(),
                params.include_comments.unwrap_or(true),
            )
            .await;
        render("fetch change", result)
    }

    async fn handle_fetch_patchset_diff(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: FetchPatchsetDiffParams = match decode(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let result = self
            .provider
            .fetch_patchset_diff(
                &params.change_id,
                &params.base_patchset,
                &params.target_patchset,
                params.file_path.as_deref(),
            )
            .await;
        render("fetch patchset diff", result)
    }

    async fn handle_submit_review(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: SubmitReviewParams = match decode(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let request = ReviewRequest {
            message: params.message,
            labels: params.labels.unwrap_or_default(),
            comments: params.comments.unwrap_or_default(),
            notify: params.notify,
        };
        let result = self
            .provider
            .submit_review(&params.change_id, params.patchset_number.as_deref(), request)
            .await;
        render("submit review", result)
    }
}

fn decode<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, ToolCallResult> {
    serde_json::from_value(arguments.unwrap_or_else(|| Value::Object(Default::default())))
        .map_err(|e| ToolCallResult::error(format!("Invalid arguments: {}", e)))
}

fn render<T: Serialize>(action: &str, result: gerrit_review_core::Result<T>) -> ToolCallResult {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => ToolCallResult::error(format!("Failed to serialize result: {}", e)),
        },
        Err(e) => {
            tracing::warn!(error = %e, retryable = e.is_retryable(), "Failed to {}", action);
            ToolCallResult::error(format!("Failed to {}: {}", action, e))
        }
    }
}

/// Patchset numbers arrive as strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => string_or_number(value).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parameters for fetch_gerrit_change tool.
#[derive(Debug, Deserialize)]
struct FetchChangeParams {
    change_id: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    patchset_number: Option<String>,
    #[serde(default)]
    include_comments: Option<bool>,
}

/// Parameters for fetch_patchset_diff tool.
#[derive(Debug, Deserialize)]
struct FetchPatchsetDiffParams {
    change_id: String,
    #[serde(deserialize_with = "string_or_number")]
    base_patchset: String,
    #[serde(deserialize_with = "string_or_number")]
    target_patchset: String,
    #[serde(default)]
    file_path: Option<String>,
}

/// Parameters for submit_gerrit_review tool.
#[derive(Debug, Deserialize)]
struct SubmitReviewParams {
    change_id: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    patchset_number: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    labels: Option<BTreeMap<String, i32>>,
    #[serde(default)]
    comments: Option<Vec<ReviewComment>>,
    #[serde(default)]
    notify: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gerrit_review_core::{
        ChangeView, Error, FileDiff, FileStatus, PatchsetDiffResult, Result, ReviewResult,
    };
    use std::sync::Mutex;

    /// Fake provider recording the arguments it was called with.
    #[derive(Default)]
    struct FakeProvider {
        calls: Mutex<Vec<String>>,
        fail_with_not_found: bool,
    }

    impl FakeProvider {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReviewProvider for FakeProvider {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_change(
            &self,
            change_id: &str,
            patchset_number: Option<&str>,
            include_comments: bool,
        ) -> Result<ChangeView> {
            self.calls.lock().unwrap().push(format!(
                "fetch_change {} {:?} {}",
                change_id, patchset_number, include_comments
            ));
            if self.fail_with_not_found {
                return Err(Error::ChangeNotFound(change_id.to_string()));
            }
            Ok(ChangeView {
                change_id: change_id.to_string(),
                change_number: Some(100),
                project: "demo".to_string(),
                branch: "main".to_string(),
                subject: "Fix the thing".to_string(),
                status: "NEW".to_string(),
                owner: "Jane Doe".to_string(),
                current_patchset: 2,
                patchset: 2,
                revision: "rev2".to_string(),
                files: vec![FileDiff {
                    path: "a.txt".to_string(),
                    old_path: None,
                    status: FileStatus::Modified,
                    insertions: 1,
                    deletions: 1,
                    diff_content: Some("-old\n+new\n".to_string()),
                    binary: false,
                }],
                excluded_files: vec![],
                inline_comments: include_comments.then(Vec::new),
                comment_fetch_error: None,
            })
        }

        async fn fetch_patchset_diff(
            &self,
            change_id: &str,
            base_patchset: &str,
            target_patchset: &str,
            file_path: Option<&str>,
        ) -> Result<PatchsetDiffResult> {
            self.calls.lock().unwrap().push(format!(
                "fetch_patchset_diff {} {} {} {:?}",
                change_id, base_patchset, target_patchset, file_path
            ));
            Ok(PatchsetDiffResult::empty(change_id, base_patchset, target_patchset))
        }

        async fn submit_review(
            &self,
            change_id: &str,
            patchset_number: Option<&str>,
            review: ReviewRequest,
        ) -> Result<ReviewResult> {
            self.calls.lock().unwrap().push(format!(
                "submit_review {} {:?} {:?} {}",
                change_id,
                patchset_number,
                review.message,
                review.comments.len()
            ));
            Ok(ReviewResult {
                change_id: change_id.to_string(),
                revision: "rev2".to_string(),
                patchset: 2,
                labels: review.labels,
            })
        }
    }

    fn handler(provider: &Arc<FakeProvider>) -> ToolHandler {
        ToolHandler::new(provider.clone() as Arc<dyn ReviewProvider>)
    }

    #[test]
    fn test_available_tools() {
        let provider = Arc::new(FakeProvider::default());
        let names: Vec<_> = handler(&provider)
            .available_tools()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            vec!["fetch_gerrit_change", "fetch_patchset_diff", "submit_gerrit_review"]
        );
    }

    #[tokio::test]
    async fn test_fetch_change_defaults_to_comments() {
        let provider = Arc::new(FakeProvider::default());
        let result = handler(&provider)
            .execute(
                "fetch_gerrit_change",
                Some(serde_json::json!({"change_id": "100"})),
            )
            .await;

        assert!(result.is_error.is_none());
        assert_eq!(provider.calls(), vec!["fetch_change 100 None true"]);
        let json: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(json["subject"], "Fix the thing");
        assert_eq!(json["files"][0]["status"], "modified");
        assert_eq!(json["inline_comments"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_fetch_change_numeric_patchset() {
        let provider = Arc::new(FakeProvider::default());
        handler(&provider)
            .execute(
                "fetch_gerrit_change",
                Some(serde_json::json!({
                    "change_id": "100",
                    "patchset_number": 1,
                    "include_comments": false
                })),
            )
            .await;
        assert_eq!(provider.calls(), vec!["fetch_change 100 Some(\"1\") false"]);
    }

    #[tokio::test]
    async fn test_fetch_patchset_diff() {
        let provider = Arc::new(FakeProvider::default());
        let result = handler(&provider)
            .execute(
                "fetch_patchset_diff",
                Some(serde_json::json!({
                    "change_id": "100",
                    "base_patchset": 1,
                    "target_patchset": "current",
                    "file_path": "y.py"
                })),
            )
            .await;

        assert!(result.is_error.is_none());
        assert_eq!(
            provider.calls(),
            vec!["fetch_patchset_diff 100 1 current Some(\"y.py\")"]
        );
    }

    #[tokio::test]
    async fn test_submit_review() {
        let provider = Arc::new(FakeProvider::default());
        let result = handler(&provider)
            .execute(
                "submit_gerrit_review",
                Some(serde_json::json!({
                    "change_id": "100",
                    "message": "LGTM",
                    "labels": {"Code-Review": 1},
                    "comments": [{"path": "a.txt", "line": 2, "message": "nit"}]
                })),
            )
            .await;

        assert!(result.is_error.is_none());
        assert_eq!(
            provider.calls(),
            vec!["submit_review 100 None Some(\"LGTM\") 1"]
        );
        let json: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(json["labels"]["Code-Review"], 1);
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let provider = Arc::new(FakeProvider::default());
        let result = handler(&provider)
            .execute(
                "fetch_patchset_diff",
                Some(serde_json::json!({"change_id": "100", "base_patchset": 1})),
            )
            .await;

        assert_eq!(result.is_error, Some(true));
        assert!(result.first_text().unwrap().contains("target_patchset"));
        assert!(provider.calls().is_empty());

        let result = handler(&provider).execute("fetch_gerrit_change", None).await;
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let provider = Arc::new(FakeProvider {
            fail_with_not_found: true,
            ..Default::default()
        });
        let result = handler(&provider)
            .execute(
                "fetch_gerrit_change",
                Some(serde_json::json!({"change_id": "999"})),
            )
            .await;

        assert_eq!(result.is_error, Some(true));
        assert!(result.first_text().unwrap().contains("Change not found: 999"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let provider = Arc::new(FakeProvider::default());
        let result = handler(&provider).execute("get_issues", None).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.first_text().unwrap().contains("Unknown tool"));
    }
}
