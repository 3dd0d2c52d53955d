//! Gerrit REST client implementation.
//!
//! Thin request/response layer: composes `{base}/a/...` URLs, applies the
//! session's credentials, strips Gerrit's anti-XSSI guard line and maps
//! failures onto the engine's error taxonomy.

use gerrit_review_core::{AuthFailureKind, Error, GerritConfig, Result, TlsPolicy};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::Session;

/// Guard line Gerrit puts in front of every JSON body.
pub const MAGIC_PREFIX: &str = ")]}'\n";

/// Raw response of a request whose status has not been interpreted yet.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

/// Gerrit REST client.
#[derive(Debug, Clone)]
pub struct GerritClient {
    base_url: Url,
    client: reqwest::Client,
}

impl GerritClient {
    /// Create a client honoring the configured TLS policy and timeout.
    pub fn new(config: &GerritConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url()).map_err(|e| {
            Error::Configuration(format!("Invalid base URL '{}': {}", config.base_url(), e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "Base URL '{}' cannot carry API paths",
                config.base_url()
            )));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("gerrit-review-tools/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none());

        match config.tls() {
            TlsPolicy::Verify => {}
            TlsPolicy::VerifyWithBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    Error::Configuration(format!(
                        "Failed to read CA bundle '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                    Error::Configuration(format!(
                        "Invalid CA bundle '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                if certs.is_empty() {
                    return Err(Error::Configuration(format!(
                        "CA bundle '{}' contains no certificates",
                        path.display()
                    )));
                }
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
            TlsPolicy::Disabled => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Base URL including any path prefix.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Authenticated endpoint URL: `{base}/a/{segments...}`, each segment
    /// percent-encoded (so file paths keep their `/` as `%2F`).
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Configuration("Base URL cannot carry API paths".to_string()))?
            .pop_if_empty()
            .push("a")
            .extend(segments);
        Ok(url)
    }

    /// Make an authenticated GET request with typed deserialization.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "Gerrit GET request");

        let request = self.client.get(url).query(query);
        let raw = self.send(session.authorize(request)).await?;
        self.handle_response(session, raw)
    }

    /// Make an authenticated POST request with a JSON body.
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        session: &Session,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "Gerrit POST request");

        let request = self.client.post(url).json(body);
        let raw = self.send(session.authorize(request)).await?;
        self.handle_response(session, raw)
    }

    /// GET without interpreting the status; used by the auth probe.
    pub(crate) async fn get_raw(&self, session: &Session, segments: &[&str]) -> Result<RawResponse> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, scheme = %session.mode(), "Gerrit auth probe");
        self.send(session.authorize(self.client.get(url))).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RawResponse> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(map_transport_error)?;

        Ok(RawResponse {
            status,
            location,
            body,
        })
    }

    /// Handle response and map errors.
    fn handle_response<T: DeserializeOwned>(
        &self,
        session: &Session,
        raw: RawResponse,
    ) -> Result<T> {
        if !(200..300).contains(&raw.status) {
            let message = raw.body.trim().to_string();
            warn!(
                status = raw.status,
                message = message,
                "Gerrit API error response"
            );
            if raw.status == 401 {
                return Err(Error::Authentication {
                    kind: AuthFailureKind::BadCredentials,
                    mode: session.mode(),
                    message: format!("session rejected by server (401): {}", message),
                });
            }
            return Err(Error::from_status(raw.status, message));
        }

        parse_gerrit_json(&raw.body)
    }
}

/// Strip the guard line and deserialize a Gerrit JSON body.
pub fn parse_gerrit_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    let json = body.strip_prefix(MAGIC_PREFIX).ok_or_else(|| {
        let preview: String = body.chars().take(60).collect();
        Error::MalformedResponse(format!(
            "missing Gerrit JSON prefix; response starts with {:?}",
            preview
        ))
    })?;

    serde_json::from_str(json)
        .map_err(|e| Error::MalformedResponse(format!("unexpected response shape: {}", e)))
}

fn map_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
