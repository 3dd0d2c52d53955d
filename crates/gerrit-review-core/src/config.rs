//! Configuration management for gerrit-review-tools.
//!
//! Settings come from a flat key-value source (process environment, or any
//! iterator of pairs) optionally layered over a TOML file stored in the
//! platform config directory:
//!
//! - **macOS/Linux**: `~/.config/gerrit-review/config.toml`
//! - **Windows**: `%APPDATA%\gerrit-review\config.toml`
//!
//! Raw [`GerritSettings`] are resolved once into an immutable
//! [`GerritConfig`] that the engine shares for the lifetime of the process.
//!
//! # Example
//!
//! ```ignore
//! use gerrit_review_core::config::{GerritConfig, GerritSettings};
//!
//! let settings = GerritSettings::load()?.merge(GerritSettings::from_env());
//! let config = GerritConfig::resolve(&settings)?;
//! println!("{}", config.base_url());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::filter::ExclusionFilter;
use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "gerrit-review";

/// Connect and read timeout applied to every outbound request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_HOST: &str = "GERRIT_HOST";
const ENV_USER: &str = "GERRIT_USER";
const ENV_HTTP_PASSWORD: &str = "GERRIT_HTTP_PASSWORD";
const ENV_PASSWORD: &str = "GERRIT_PASSWORD";
const ENV_AUTH_METHOD: &str = "GERRIT_AUTH_METHOD";
const ENV_EXCLUDED_PATTERNS: &str = "GERRIT_EXCLUDED_PATTERNS";
const ENV_SSL_VERIFY: &str = "GERRIT_SSL_VERIFY";
const ENV_CA_BUNDLE: &str = "GERRIT_CA_BUNDLE";
const ENV_TIMEOUT_SECS: &str = "GERRIT_TIMEOUT_SECS";

// =============================================================================
// Raw settings
// =============================================================================

/// Unvalidated settings as read from a key-value source or TOML file.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GerritSettings {
    /// Gerrit host, with or without scheme and path prefix (e.g. `example.com/r`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// HTTP password generated in Gerrit Settings > HTTP Credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_password: Option<String>,
    /// Account login (LDAP) password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    /// Comma-separated regex list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_patterns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_verify: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for GerritSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GerritSettings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("http_password", &self.http_password.as_ref().map(|_| "***"))
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_method", &self.auth_method)
            .field("excluded_patterns", &self.excluded_patterns)
            .field("ssl_verify", &self.ssl_verify)
            .field("ca_bundle", &self.ca_bundle)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GerritSettings {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| {
                Error::Configuration("Could not determine config directory".to_string())
            })
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load settings from the default file location.
    ///
    /// Returns empty settings if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load settings from a specific TOML file.
    ///
    /// Returns empty settings if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read config file: {}", e)))?;

        let settings: GerritSettings = toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(settings)
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from any key-value source using the `GERRIT_*` names.
    /// Unknown keys are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Self::default();
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                ENV_HOST => settings.host = Some(value),
                ENV_USER => settings.user = Some(value),
                ENV_HTTP_PASSWORD => settings.http_password = Some(value),
                ENV_PASSWORD => settings.password = Some(value),
                ENV_AUTH_METHOD => settings.auth_method = Some(value),
                ENV_EXCLUDED_PATTERNS => settings.excluded_patterns = Some(value),
                ENV_SSL_VERIFY => settings.ssl_verify = Some(value),
                ENV_CA_BUNDLE => settings.ca_bundle = Some(value),
                ENV_TIMEOUT_SECS => match value.trim().parse() {
                    Ok(secs) => settings.timeout_secs = Some(secs),
                    Err(_) => warn!(value = %value, "Ignoring non-numeric {}", ENV_TIMEOUT_SECS),
                },
                _ => {}
            }
        }
        settings
    }

    /// Layer `other` on top of `self`; values present in `other` win.
    pub fn merge(self, other: GerritSettings) -> Self {
        Self {
            host: other.host.or(self.host),
            user: other.user.or(self.user),
            http_password: other.http_password.or(self.http_password),
            password: other.password.or(self.password),
            auth_method: other.auth_method.or(self.auth_method),
            excluded_patterns: other.excluded_patterns.or(self.excluded_patterns),
            ssl_verify: other.ssl_verify.or(self.ssl_verify),
            ca_bundle: other.ca_bundle.or(self.ca_bundle),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }
}

// =============================================================================
// Resolved configuration
// =============================================================================

/// Which password the account authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Generated HTTP password (what modern Gerrit expects)
    HttpPassword,
    /// Legacy account/LDAP login password
    LoginPassword,
}

impl AuthMode {
    /// Parse a configured auth method, case-insensitively.
    ///
    /// The legacy names `digest` and `basic` map to the HTTP password and the
    /// login password respectively.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http_password" | "http" | "digest" => Ok(Self::HttpPassword),
            "login_password" | "login" | "ldap" | "basic" => Ok(Self::LoginPassword),
            _ => Err(Error::Configuration(format!(
                "Invalid authentication method: '{}'. Must be one of \
                 [http_password, login_password] (legacy: digest, basic)",
                raw
            ))),
        }
    }

    /// The other scheme, used as fallback.
    pub fn other(self) -> Self {
        match self {
            Self::HttpPassword => Self::LoginPassword,
            Self::LoginPassword => Self::HttpPassword,
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpPassword => f.write_str("http_password"),
            Self::LoginPassword => f.write_str("login_password"),
        }
    }
}

/// Account credentials. Secrets are redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    http_password: Option<String>,
    login_password: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        http_password: Option<String>,
        login_password: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            http_password,
            login_password,
        }
    }

    /// Secret to use for the given scheme, if configured.
    pub fn secret_for(&self, mode: AuthMode) -> Option<&str> {
        match mode {
            AuthMode::HttpPassword => self.http_password.as_deref(),
            AuthMode::LoginPassword => self.login_password.as_deref(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("http_password", &self.http_password.as_ref().map(|_| "***"))
            .field("login_password", &self.login_password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Effective TLS verification policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify against the system roots
    Verify,
    /// Verify, additionally trusting the given PEM bundle
    VerifyWithBundle(PathBuf),
    /// No verification
    Disabled,
}

impl TlsPolicy {
    pub fn verifies(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Validated, immutable engine configuration.
#[derive(Debug, Clone)]
pub struct GerritConfig {
    base_url: String,
    auth_mode: AuthMode,
    credentials: Credentials,
    tls: TlsPolicy,
    excluded: ExclusionFilter,
    timeout: Duration,
}

impl GerritConfig {
    /// Resolve configuration from the default TOML file layered under the
    /// process environment.
    pub fn from_env() -> Result<Self> {
        let settings = GerritSettings::load()?.merge(GerritSettings::from_env());
        Self::resolve(&settings)
    }

    /// Validate raw settings.
    pub fn resolve(settings: &GerritSettings) -> Result<Self> {
        let host = non_empty(settings.host.as_deref())
            .ok_or_else(|| Error::Configuration(format!("{} is not set", ENV_HOST)))?;
        let base_url = normalize_base_url(host)?;

        let username = non_empty(settings.user.as_deref())
            .ok_or_else(|| Error::Configuration(format!("{} is not set", ENV_USER)))?;

        let auth_mode = match non_empty(settings.auth_method.as_deref()) {
            Some(raw) => AuthMode::parse(raw)?,
            None => AuthMode::HttpPassword,
        };

        let credentials = Credentials::new(
            username,
            non_empty(settings.http_password.as_deref()).map(str::to_string),
            non_empty(settings.password.as_deref()).map(str::to_string),
        );

        if credentials.secret_for(auth_mode).is_none() {
            return Err(Error::Configuration(match auth_mode {
                AuthMode::HttpPassword => format!(
                    "{} is required for {} authentication. Set it to the HTTP password from \
                     Gerrit Settings > HTTP Credentials",
                    ENV_HTTP_PASSWORD, auth_mode
                ),
                AuthMode::LoginPassword => format!(
                    "{} is required for {} authentication. Set it to your account (LDAP) password",
                    ENV_PASSWORD, auth_mode
                ),
            }));
        }

        let tls = resolve_tls_policy(settings.ssl_verify.as_deref(), settings.ca_bundle.as_deref())?;

        let excluded = settings
            .excluded_patterns
            .as_deref()
            .map(ExclusionFilter::parse)
            .unwrap_or_default();

        let timeout = Duration::from_secs(
            settings
                .timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        info!(
            base_url = %base_url,
            auth_mode = %auth_mode,
            tls_verify = tls.verifies(),
            excluded_patterns = excluded.len(),
            "Gerrit configuration resolved"
        );

        Ok(Self {
            base_url,
            auth_mode,
            credentials,
            tls,
            excluded,
            timeout,
        })
    }

    /// Base URL including any path prefix, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn tls(&self) -> &TlsPolicy {
        &self.tls
    }

    pub fn excluded(&self) -> &ExclusionFilter {
        &self.excluded
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Replace the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Normalize a host setting into a base URL.
///
/// `gerrit.example.com/r/` becomes `https://gerrit.example.com/r`. A trailing
/// `/a` is dropped since the client adds the authenticated prefix itself.
fn normalize_base_url(host: &str) -> Result<String> {
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    let (scheme, rest) = with_scheme
        .split_once("://")
        .ok_or_else(|| Error::Configuration(format!("Invalid {}: '{}'", ENV_HOST, host)))?;
    if scheme != "https" && scheme != "http" {
        return Err(Error::Configuration(format!(
            "Unsupported scheme '{}' in {}",
            scheme, ENV_HOST
        )));
    }

    let mut rest = rest.trim_end_matches('/');
    while let Some(stripped) = rest.strip_suffix("/a") {
        rest = stripped.trim_end_matches('/');
    }

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(Error::Configuration(format!(
            "Invalid {}: '{}' has no host name",
            ENV_HOST, host
        )));
    }

    Ok(format!("{}://{}", scheme, rest))
}

/// Resolve the TLS policy. A CA bundle always wins over `ssl_verify`.
fn resolve_tls_policy(ssl_verify: Option<&str>, ca_bundle: Option<&str>) -> Result<TlsPolicy> {
    if let Some(raw) = ca_bundle.filter(|v| !v.is_empty()) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Configuration(format!(
                "{} is set but empty after trimming whitespace",
                ENV_CA_BUNDLE
            )));
        }
        let path = expand_home(trimmed);
        if !path.is_file() {
            return Err(Error::Configuration(format!(
                "Configured {} path '{}' does not exist",
                ENV_CA_BUNDLE,
                path.display()
            )));
        }
        if ssl_verify.is_some_and(|v| is_falsy(v.trim())) {
            warn!("{} overrides {}; TLS verification stays enabled", ENV_CA_BUNDLE, ENV_SSL_VERIFY);
        }
        return Ok(TlsPolicy::VerifyWithBundle(path));
    }

    let Some(raw) = ssl_verify.map(str::trim) else {
        return Ok(TlsPolicy::Verify);
    };

    if is_truthy(raw) {
        return Ok(TlsPolicy::Verify);
    }
    if is_falsy(raw) {
        warn!("TLS verification disabled via {}. Use with caution", ENV_SSL_VERIFY);
        return Ok(TlsPolicy::Disabled);
    }

    let path = expand_home(raw);
    if path.is_file() {
        return Ok(TlsPolicy::VerifyWithBundle(path));
    }

    Err(Error::Configuration(format!(
        "Invalid {} value '{}'. Provide true/false or a path to a CA bundle",
        ENV_SSL_VERIFY, raw
    )))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn is_falsy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// =============================================================================
// Tests
// =============================================================================
