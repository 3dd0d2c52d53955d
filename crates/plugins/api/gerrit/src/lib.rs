//! Gerrit provider implementation for gerrit-review-tools.
//!
//! This crate talks to the Gerrit REST API: it selects a working
//! authentication scheme, aggregates change detail, files, diffs and inline
//! comments into one view, compares patchsets, and posts reviews.

pub mod api;
pub mod auth;
pub mod change;
mod client;
pub mod compare;
pub mod diff;
mod provider;
pub mod review;
pub mod types;

#[cfg(test)]
mod test_support;

pub use api::GerritApi;
pub use auth::{authenticate, AuthState, Session};
pub use client::{parse_gerrit_json, GerritClient, MAGIC_PREFIX};
pub use provider::GerritProvider;
