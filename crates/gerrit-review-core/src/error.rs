//! Error types for gerrit-review-tools.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthMode;

/// Why an authentication attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureKind {
    /// The server understood Basic auth but rejected the credentials.
    BadCredentials,
    /// The server does not accept this scheme at all (LDAP form, OAuth, SSO).
    PolicyMismatch,
}

impl AuthFailureKind {
    /// Actionable guidance for the caller, given the scheme that was rejected.
    pub fn hint(self, rejected: AuthMode) -> &'static str {
        match (self, rejected) {
            (Self::BadCredentials, AuthMode::HttpPassword) => {
                "check GERRIT_USER and the HTTP password from Gerrit Settings > HTTP Credentials"
            }
            (Self::BadCredentials, AuthMode::LoginPassword) => {
                "check GERRIT_USER and the account login password in GERRIT_PASSWORD"
            }
            (Self::PolicyMismatch, AuthMode::HttpPassword) => {
                "the server does not accept the HTTP password for this account; it may be \
                 LDAP-form, OAuth or SSO only, try GERRIT_AUTH_METHOD=login_password with \
                 GERRIT_PASSWORD"
            }
            (Self::PolicyMismatch, AuthMode::LoginPassword) => {
                "the server does not accept the login password over HTTP Basic; generate an \
                 HTTP password in Gerrit Settings > HTTP Credentials and set \
                 GERRIT_AUTH_METHOD=http_password with GERRIT_HTTP_PASSWORD"
            }
        }
    }
}

impl fmt::Display for AuthFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadCredentials => f.write_str("bad credentials"),
            Self::PolicyMismatch => f.write_str("auth policy mismatch"),
        }
    }
}

/// Which side of a patchset comparison a patchset reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchsetSide {
    Base,
    Target,
}

impl fmt::Display for PatchsetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Main error type for gerrit-review operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid settings, detected at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every configured auth scheme was rejected; `mode` is the scheme the
    /// hint is about
    #[error("Authentication error ({kind}): {message}. Hint: {}", kind.hint(*mode))]
    Authentication {
        kind: AuthFailureKind,
        mode: AuthMode,
        message: String,
    },

    /// The change id does not resolve on the server
    #[error("Change not found: {0}")]
    ChangeNotFound(String),

    /// The requested patchset does not exist on the change
    #[error(
        "{} not found for change {change_id} (available patchsets: {})",
        describe_patchset(*side, patchset),
        describe_available(available)
    )]
    PatchsetNotFound {
        change_id: String,
        patchset: String,
        side: Option<PatchsetSide>,
        available: Vec<String>,
    },

    /// Gerrit answered with a non-2xx status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server broke a protocol assumption (missing magic prefix, wrong shape)
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Caller-supplied input was rejected before any request was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn describe_patchset(side: Option<PatchsetSide>, patchset: &str) -> String {
    match side {
        Some(side) => format!("{side} patchset {patchset}"),
        None => format!("Patchset {patchset}"),
    }
}

fn describe_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

impl Error {
    /// Map a non-success HTTP status to an API error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::Http(_) => true,
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type alias for gerrit-review operations.
pub type Result<T> = std::result::Result<T, Error>;
