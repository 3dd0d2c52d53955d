//! Core traits, types, and error handling for gerrit-review-tools.
//!
//! This crate provides the provider-neutral pieces of the review engine:
//! configuration resolution, path exclusion, the unified result types and
//! the [`ReviewProvider`] trait implemented by backends.

pub mod config;
pub mod error;
pub mod filter;
pub mod provider;
pub mod types;

pub use config::{AuthMode, Credentials, GerritConfig, GerritSettings, TlsPolicy};
pub use error::{AuthFailureKind, Error, PatchsetSide, Result};
pub use filter::{filter_files, ExclusionFilter};
pub use provider::ReviewProvider;
pub use types::{
    ChangeId, ChangeView, CommentFetch, CommentRange, ExcludedFile, FileDiff, FileStatus,
    InlineComment, PatchsetDiffResult, PatchsetRef, PatchsetSelector, ReviewComment,
    ReviewRequest, ReviewResult,
};
