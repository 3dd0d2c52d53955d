//! MCP tool surface for gerrit-review-tools.
//!
//! Exposes the review engine to AI assistants as three tools:
//! `fetch_gerrit_change`, `fetch_patchset_diff` and `submit_gerrit_review`.

pub mod handlers;
pub mod protocol;

pub use handlers::ToolHandler;
pub use protocol::{ToolCallParams, ToolCallResult, ToolDefinition, ToolResultContent};
