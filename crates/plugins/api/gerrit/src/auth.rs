//! Authentication strategy selection.
//!
//! Gerrit only accepts HTTP Basic on the `/a/` prefix, but which secret it
//! wants depends on the server's auth backend: the generated HTTP password on
//! most installations, the account login password on some LDAP setups. The
//! selector probes `/a/accounts/self` with each configured scheme in order
//! and stops at the first one the server accepts.
//!
//! ```text
//! Unauthenticated -> TryPrimary -> Authenticated
//!                        |
//!                        v
//!                   TryFallback -> Authenticated | Failed
//! ```

use std::fmt;

use gerrit_review_core::{AuthFailureKind, AuthMode, Error, GerritConfig, Result};
use tracing::{debug, info, warn};

use crate::client::{GerritClient, MAGIC_PREFIX};

/// Endpoint used to verify a scheme; cheap and available to every account.
const PROBE_PATH: [&str; 2] = ["accounts", "self"];

/// Credentials bound to the scheme the server accepted.
#[derive(Clone)]
pub struct Session {
    mode: AuthMode,
    username: String,
    secret: String,
}

impl Session {
    pub fn new(mode: AuthMode, username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            mode,
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Apply HTTP Basic credentials to a request.
    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.username, Some(&self.secret))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

/// Selector state.
#[derive(Debug)]
pub enum AuthState {
    Unauthenticated,
    TryPrimary,
    /// Carries the primary scheme's rejection
    TryFallback(AuthRejection),
    Authenticated(Session),
    Failed(Error),
}

/// Why the server turned a scheme down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejection {
    pub mode: AuthMode,
    pub kind: AuthFailureKind,
    pub detail: String,
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rejected: {}", self.mode, self.detail)
    }
}

/// Outcome of probing one scheme.
#[derive(Debug)]
enum ProbeOutcome {
    Accepted,
    Rejected(AuthRejection),
}

/// Ordered sessions to try: the configured scheme first, then the other one
/// when its secret is configured and differs from the primary secret.
pub fn plan(config: &GerritConfig) -> Vec<Session> {
    let credentials = config.credentials();
    let primary_mode = config.auth_mode();
    let fallback_mode = primary_mode.other();

    let mut sessions = Vec::with_capacity(2);
    let primary_secret = credentials.secret_for(primary_mode);
    if let Some(secret) = primary_secret {
        sessions.push(Session::new(primary_mode, &credentials.username, secret));
    }
    if let Some(secret) = credentials
        .secret_for(fallback_mode)
        .filter(|s| Some(*s) != primary_secret)
    {
        sessions.push(Session::new(fallback_mode, &credentials.username, secret));
    }
    sessions
}

/// Obtain a working session, trying at most two schemes.
pub async fn authenticate(client: &GerritClient, config: &GerritConfig) -> Result<Session> {
    let mut attempts = plan(config).into_iter();
    let mut state = AuthState::Unauthenticated;

    loop {
        state = match state {
            AuthState::Unauthenticated => AuthState::TryPrimary,

            AuthState::TryPrimary => match attempts.next() {
                None => AuthState::Failed(Error::Configuration(
                    "no credentials configured for any authentication scheme".to_string(),
                )),
                Some(session) => match probe(client, &session).await {
                    Ok(ProbeOutcome::Accepted) => AuthState::Authenticated(session),
                    Ok(ProbeOutcome::Rejected(rejection)) => {
                        warn!(
                            mode = %rejection.mode,
                            kind = %rejection.kind,
                            "Primary authentication scheme rejected"
                        );
                        AuthState::TryFallback(rejection)
                    }
                    Err(e) => AuthState::Failed(e),
                },
            },

            AuthState::TryFallback(primary) => match attempts.next() {
                None => AuthState::Failed(Error::Authentication {
                    kind: primary.kind,
                    mode: primary.mode,
                    message: primary.to_string(),
                }),
                Some(session) => {
                    info!(mode = %session.mode(), "Retrying with fallback authentication scheme");
                    match probe(client, &session).await {
                        Ok(ProbeOutcome::Accepted) => AuthState::Authenticated(session),
                        Ok(ProbeOutcome::Rejected(fallback)) => {
                            AuthState::Failed(exhausted(&primary, &fallback))
                        }
                        Err(e) => AuthState::Failed(e),
                    }
                }
            },

            AuthState::Authenticated(session) => {
                info!(
                    mode = %session.mode(),
                    username = session.username(),
                    "Gerrit session established"
                );
                return Ok(session);
            }

            AuthState::Failed(error) => return Err(error),
        };
    }
}

fn exhausted(primary: &AuthRejection, fallback: &AuthRejection) -> Error {
    // A policy signal outranks bad credentials; the hint follows the scheme
    // that produced it.
    let decisive = [primary, fallback]
        .into_iter()
        .find(|r| r.kind == AuthFailureKind::PolicyMismatch)
        .unwrap_or(primary);
    Error::Authentication {
        kind: decisive.kind,
        mode: decisive.mode,
        message: format!("{}; {}", primary, fallback),
    }
}

async fn probe(client: &GerritClient, session: &Session) -> Result<ProbeOutcome> {
    let raw = client.get_raw(session, &PROBE_PATH).await?;
    debug!(status = raw.status, mode = %session.mode(), "Auth probe answered");

    let rejected = |kind, detail: String| {
        Ok(ProbeOutcome::Rejected(AuthRejection {
            mode: session.mode(),
            kind,
            detail,
        }))
    };

    match raw.status {
        200..=299 if raw.body.starts_with(MAGIC_PREFIX) => Ok(ProbeOutcome::Accepted),
        200..=299 => rejected(
            AuthFailureKind::PolicyMismatch,
            "server answered with a non-Gerrit page (login form or proxy)".to_string(),
        ),
        300..=399 => rejected(
            AuthFailureKind::PolicyMismatch,
            format!(
                "server redirected ({}) to {}",
                raw.status,
                raw.location.as_deref().unwrap_or("an unknown location")
            ),
        ),
        401 => rejected(
            AuthFailureKind::BadCredentials,
            "server returned 401".to_string(),
        ),
        403 => rejected(
            AuthFailureKind::PolicyMismatch,
            "server returned 403".to_string(),
        ),
        status => {
            let message = raw.body.trim().to_string();
            warn!(status, message = message, "Unexpected auth probe response");
            Err(Error::from_status(status, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{basic_auth_header, config_for, gerrit_body};
    use httpmock::prelude::*;

    fn account() -> String {
        gerrit_body(&serde_json::json!({"_account_id": 1000, "username": "alice"}))
    }

    #[test]
    fn test_plan_orders_configured_scheme_first() {
        let config = config_for(
            "https://gerrit.example.com",
            &[("GERRIT_PASSWORD", "ldap-secret")],
        );
        let modes: Vec<_> = plan(&config).iter().map(Session::mode).collect();
        assert_eq!(modes, vec![AuthMode::HttpPassword, AuthMode::LoginPassword]);

        let config = config_for(
            "https://gerrit.example.com",
            &[
                ("GERRIT_PASSWORD", "ldap-secret"),
                ("GERRIT_AUTH_METHOD", "login_password"),
            ],
        );
        let modes: Vec<_> = plan(&config).iter().map(Session::mode).collect();
        assert_eq!(modes, vec![AuthMode::LoginPassword, AuthMode::HttpPassword]);
    }

    #[test]
    fn test_plan_without_fallback_secret() {
        let config = config_for("https://gerrit.example.com", &[]);
        assert_eq!(plan(&config).len(), 1);

        let config = config_for("https://gerrit.example.com", &[("GERRIT_PASSWORD", "secret")]);
        assert_eq!(plan(&config).len(), 1);
    }

    #[test]
    fn test_session_debug_redacts_secret() {
        let session = Session::new(AuthMode::HttpPassword, "alice", "top-secret");
        assert!(!format!("{:?}", session).contains("top-secret"));
    }

    #[tokio::test]
    async fn test_primary_scheme_accepted() {
        let server = MockServer::start();
        let probe = server.mock(|when, then| {
            when.method(GET)
                .path("/a/accounts/self")
                .header("authorization", basic_auth_header("alice", "secret"));
            then.status(200).body(account());
        });

        let config = config_for(&server.base_url(), &[("GERRIT_PASSWORD", "ldap-secret")]);
        let client = GerritClient::new(&config).unwrap();
        let session = authenticate(&client, &config).await.unwrap();

        probe.assert_calls(1);
        assert_eq!(session.mode(), AuthMode::HttpPassword);
    }

    #[tokio::test]
    async fn test_fallback_after_401_retries_exactly_once() {
        let server = MockServer::start();
        let primary = server.mock(|when, then| {
            when.method(GET)
                .path("/a/accounts/self")
                .header("authorization", basic_auth_header("alice", "secret"));
            then.status(401).body("Unauthorized");
        });
        let fallback = server.mock(|when, then| {
            when.method(GET)
                .path("/a/accounts/self")
                .header("authorization", basic_auth_header("alice", "ldap-secret"));
            then.status(200).body(account());
        });

        let config = config_for(&server.base_url(), &[("GERRIT_PASSWORD", "ldap-secret")]);
        let client = GerritClient::new(&config).unwrap();
        let session = authenticate(&client, &config).await.unwrap();

        primary.assert_calls(1);
        fallback.assert_calls(1);
        assert_eq!(session.mode(), AuthMode::LoginPassword);
    }

    #[tokio::test]
    async fn test_both_schemes_rejected_is_bad_credentials() {
        let server = MockServer::start();
        let probe = server.mock(|when, then| {
            when.method(GET).path("/a/accounts/self");
            then.status(401);
        });

        let config = config_for(&server.base_url(), &[("GERRIT_PASSWORD", "ldap-secret")]);
        let client = GerritClient::new(&config).unwrap();
        let err = authenticate(&client, &config).await.unwrap_err();

        probe.assert_calls(2);
        match err {
            Error::Authentication { kind, mode, message } => {
                assert_eq!(kind, AuthFailureKind::BadCredentials);
                assert_eq!(mode, AuthMode::HttpPassword);
                assert!(message.contains("http_password"));
                assert!(message.contains("login_password"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forbidden_is_policy_mismatch() {
        let server = MockServer::start();
        let probe = server.mock(|when, then| {
            when.method(GET).path("/a/accounts/self");
            then.status(403).body("Forbidden");
        });

        let config = config_for(&server.base_url(), &[]);
        let client = GerritClient::new(&config).unwrap();
        let err = authenticate(&client, &config).await.unwrap_err();

        probe.assert_calls(1);
        assert!(matches!(
            err,
            Error::Authentication {
                kind: AuthFailureKind::PolicyMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_redirect_to_login_is_policy_mismatch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a/accounts/self");
            then.status(302).header("location", "https://sso.example.com/login");
        });

        let config = config_for(&server.base_url(), &[]);
        let client = GerritClient::new(&config).unwrap();
        let err = authenticate(&client, &config).await.unwrap_err();

        match err {
            Error::Authentication { kind, message, .. } => {
                assert_eq!(kind, AuthFailureKind::PolicyMismatch);
                assert!(message.contains("sso.example.com"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_html_login_page_is_policy_mismatch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a/accounts/self");
            then.status(200).body("<html><form>Sign in</form></html>");
        });

        let config = config_for(&server.base_url(), &[]);
        let client = GerritClient::new(&config).unwrap();
        let err = authenticate(&client, &config).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication {
                kind: AuthFailureKind::PolicyMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mixed_rejections_report_policy_mismatch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/a/accounts/self")
                .header("authorization", basic_auth_header("alice", "secret"));
            then.status(401);
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/a/accounts/self")
                .header("authorization", basic_auth_header("alice", "ldap-secret"));
            then.status(403);
        });

        let config = config_for(&server.base_url(), &[("GERRIT_PASSWORD", "ldap-secret")]);
        let client = GerritClient::new(&config).unwrap();
        let err = authenticate(&client, &config).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication {
                kind: AuthFailureKind::PolicyMismatch,
                mode: AuthMode::LoginPassword,
                ..
            }
        ));
        let text = err.to_string();
        assert!(text.contains("GERRIT_AUTH_METHOD=http_password"));
        assert!(!text.contains("GERRIT_AUTH_METHOD=login_password"));
    }

    #[tokio::test]
    async fn test_server_error_propagates_without_fallback() {
        let server = MockServer::start();
        let probe = server.mock(|when, then| {
            when.method(GET).path("/a/accounts/self");
            then.status(500).body("boom");
        });

        let config = config_for(&server.base_url(), &[("GERRIT_PASSWORD", "ldap-secret")]);
        let client = GerritClient::new(&config).unwrap();
        let err = authenticate(&client, &config).await.unwrap_err();

        probe.assert_calls(1);
        assert_eq!(err.status(), Some(500));
    }
}
