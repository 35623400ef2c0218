//! Process-wide configuration.
//!
//! Provides [`GuardConfig`], loaded once at startup from environment
//! variables. Nothing in the request path writes to it; it is shared behind an
//! `Arc` once its validation pipeline has accepted it.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{GuardError, GuardResult};
use crate::validation::ValidationPipeline;

/// How a request with a bad or missing symmetric signature is rejected.
///
/// Both variants exist in deployed services; the default is
/// [`RejectionVariant::Unauthorized`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionVariant {
    /// `401` with body `Unauthorized`.
    #[default]
    Unauthorized,
    /// `400` with body `PFO`.
    Pfo,
}

impl RejectionVariant {
    /// HTTP status code for the rejection.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Pfo => 400,
        }
    }

    /// Literal response body for the rejection.
    #[must_use]
    pub const fn body(self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::Pfo => "PFO",
        }
    }
}

impl std::str::FromStr for RejectionVariant {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unauthorized" | "401" => Ok(Self::Unauthorized),
            "pfo" | "400" => Ok(Self::Pfo),
            other => Err(GuardError::Config(format!(
                "unknown signature rejection variant: {other}"
            ))),
        }
    }
}

/// Backing store for Hawk nonce replay detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonceBackend {
    /// Process-local map covering both edges of the freshness window.
    #[default]
    Memory,
    /// Replay detection switched off; every nonce is accepted.
    Disabled,
}

/// ssoguard service configuration.
///
/// # Examples
///
/// ```
/// use ssoguard_core::GuardConfig;
///
/// let config = GuardConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:8003");
/// assert_eq!(config.nonce_expiry_seconds, 60);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    /// Bind address (e.g. `"0.0.0.0:8003"`).
    #[builder(default = String::from("0.0.0.0:8003"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Secret for the `ui` namespace; every non-excluded request must carry it.
    #[builder(default)]
    #[serde(skip_serializing, default)]
    pub signature_secret: String,

    /// Header carrying the `ui` namespace signature.
    #[builder(default = String::from("X-Signature"))]
    pub signature_header: String,

    /// Optional secret for the `proxy` namespace.
    #[builder(default)]
    #[serde(skip_serializing, default)]
    pub proxy_signature_secret: Option<String>,

    /// Header carrying the `proxy` namespace signature.
    #[builder(default = String::from("X-Proxy-Signature"))]
    pub proxy_signature_header: String,

    /// Skip symmetric signature checks entirely (development only).
    #[builder(default = false)]
    pub skip_signature_validation: bool,

    /// Response produced when a signature check fails.
    #[builder(default)]
    pub rejection_variant: RejectionVariant,

    /// Paths exempt from the signature check (exact match on the path).
    #[builder(default = default_excluded_paths())]
    pub excluded_paths: Vec<String>,

    /// Hawk key id expected on activity-stream requests.
    #[builder(default)]
    pub activity_stream_access_key_id: String,

    /// Hawk secret key for the activity stream.
    #[builder(default)]
    #[serde(skip_serializing, default)]
    pub activity_stream_secret_access_key: String,

    /// IPs allowed to appear in `X-Forwarded-For` on activity-stream requests.
    #[builder(default)]
    pub activity_stream_ip_allowlist: Vec<String>,

    /// Whether the `X-Forwarded-For` check runs at all.
    #[builder(default = true)]
    pub activity_stream_ip_check: bool,

    /// Hawk timestamp freshness window and nonce TTL, in seconds.
    #[builder(default = 60)]
    pub nonce_expiry_seconds: u64,

    /// Nonce replay store.
    #[builder(default)]
    pub nonce_backend: NonceBackend,

    /// Number of users per activity-stream page.
    #[builder(default = 2)]
    pub activity_stream_page_size: usize,

    /// Apex domains or bare suffixes a `next` redirect may point at.
    #[builder(default)]
    pub allowed_redirect_domains: Vec<String>,

    /// Query parameter carrying the redirect target.
    #[builder(default = String::from("next"))]
    pub redirect_field_name: String,

    /// Domain attribute of the `sso_display_logged_in` cookie.
    #[builder(default)]
    pub session_cookie_domain: Option<String>,

    /// Max-age of the `sso_display_logged_in` cookie, in seconds.
    #[builder(default = 1_209_600)]
    pub session_cookie_age: u64,

    /// Whether the `sso_display_logged_in` cookie is marked `Secure`.
    #[builder(default = true)]
    pub session_cookie_secure: bool,

    /// Upper bound on any session-store or nonce-store lookup, in milliseconds.
    #[builder(default = 500)]
    pub store_timeout_ms: u64,
}

fn default_excluded_paths() -> Vec<String> {
    vec![
        "/healthcheck/".to_owned(),
        "/activity-stream/".to_owned(),
        "/activity-stream/users/".to_owned(),
    ]
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GuardConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8003` |
    /// | `LOG_LEVEL` | `info` |
    /// | `SIGNATURE_SECRET` | *(empty)* |
    /// | `SIGNATURE_HEADER` | `X-Signature` |
    /// | `PROXY_SIGNATURE_SECRET` | *(unset)* |
    /// | `PROXY_SIGNATURE_HEADER` | `X-Proxy-Signature` |
    /// | `SKIP_SIGNATURE_VALIDATION` | `false` |
    /// | `SIGNATURE_REJECTION_VARIANT` | `unauthorized` |
    /// | `URLS_EXCLUDED_FROM_SIGNATURE_CHECK` | `/healthcheck/,/activity-stream/,/activity-stream/users/` |
    /// | `ACTIVITY_STREAM_ACCESS_KEY_ID` | *(empty)* |
    /// | `ACTIVITY_STREAM_SECRET_ACCESS_KEY` | *(empty)* |
    /// | `ACTIVITY_STREAM_IP_WHITELIST` | *(empty)* |
    /// | `ACTIVITY_STREAM_IP_CHECK` | `true` |
    /// | `ACTIVITY_STREAM_NONCE_EXPIRY_SECONDS` | `60` |
    /// | `FEATURE_ACTIVITY_STREAM_NONCE_CACHE_ENABLED` | `true` |
    /// | `ACTIVITY_STREAM_PAGE_SIZE` | `2` |
    /// | `ALLOWED_REDIRECT_DOMAINS` | *(empty)* |
    /// | `REDIRECT_FIELD_NAME` | `next` |
    /// | `SESSION_COOKIE_DOMAIN` | *(unset)* |
    /// | `SESSION_COOKIE_AGE` | `1209600` |
    /// | `SESSION_COOKIE_SECURE` | `true` |
    /// | `STORE_TIMEOUT_MS` | `500` |
    ///
    /// Unparseable numeric values keep their defaults; an unknown rejection
    /// variant is an error.
    pub fn from_env() -> GuardResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GuardResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("SIGNATURE_SECRET") {
            config.signature_secret = v;
        }
        if let Some(v) = lookup("SIGNATURE_HEADER") {
            config.signature_header = v;
        }
        if let Some(v) = lookup("PROXY_SIGNATURE_SECRET") {
            config.proxy_signature_secret = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("PROXY_SIGNATURE_HEADER") {
            config.proxy_signature_header = v;
        }
        if let Some(v) = lookup("SKIP_SIGNATURE_VALIDATION") {
            config.skip_signature_validation = parse_bool(&v);
        }
        if let Some(v) = lookup("SIGNATURE_REJECTION_VARIANT") {
            config.rejection_variant = v.parse()?;
        }
        if let Some(v) = lookup("URLS_EXCLUDED_FROM_SIGNATURE_CHECK") {
            config.excluded_paths = parse_list(&v);
        }
        if let Some(v) = lookup("ACTIVITY_STREAM_ACCESS_KEY_ID") {
            config.activity_stream_access_key_id = v;
        }
        if let Some(v) = lookup("ACTIVITY_STREAM_SECRET_ACCESS_KEY") {
            config.activity_stream_secret_access_key = v;
        }
        if let Some(v) = lookup("ACTIVITY_STREAM_IP_WHITELIST") {
            config.activity_stream_ip_allowlist = parse_list(&v);
        }
        if let Some(v) = lookup("ACTIVITY_STREAM_IP_CHECK") {
            config.activity_stream_ip_check = parse_bool(&v);
        }
        if let Some(n) = lookup("ACTIVITY_STREAM_NONCE_EXPIRY_SECONDS").and_then(|v| v.parse().ok())
        {
            config.nonce_expiry_seconds = n;
        }
        if let Some(v) = lookup("FEATURE_ACTIVITY_STREAM_NONCE_CACHE_ENABLED") {
            config.nonce_backend = if parse_bool(&v) {
                NonceBackend::Memory
            } else {
                NonceBackend::Disabled
            };
        }
        if let Some(n) = lookup("ACTIVITY_STREAM_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            config.activity_stream_page_size = n;
        }
        if let Some(v) = lookup("ALLOWED_REDIRECT_DOMAINS") {
            config.allowed_redirect_domains = parse_list(&v);
        }
        if let Some(v) = lookup("REDIRECT_FIELD_NAME") {
            config.redirect_field_name = v;
        }
        if let Some(v) = lookup("SESSION_COOKIE_DOMAIN") {
            config.session_cookie_domain = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(n) = lookup("SESSION_COOKIE_AGE").and_then(|v| v.parse().ok()) {
            config.session_cookie_age = n;
        }
        if let Some(v) = lookup("SESSION_COOKIE_SECURE") {
            config.session_cookie_secure = parse_bool(&v);
        }
        if let Some(n) = lookup("STORE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.store_timeout_ms = n;
        }

        Ok(config)
    }

    /// The checks every configuration must pass, independent of the auth layer.
    ///
    /// `ssoguard-auth` appends its own checks (e.g. redirect domains) before
    /// the server runs the pipeline.
    #[must_use]
    pub fn base_pipeline() -> ValidationPipeline<Self> {
        ValidationPipeline::new()
            .with("signature_secret", |c: &Self| {
                if !c.skip_signature_validation && c.signature_secret.is_empty() {
                    return Err(GuardError::EmptySecret("ui".to_owned()));
                }
                Ok(())
            })
            .with("signature_headers", |c: &Self| {
                for (key_id, header) in [
                    ("ui", &c.signature_header),
                    ("proxy", &c.proxy_signature_header),
                ] {
                    if !is_header_name(header) {
                        return Err(GuardError::InvalidHeaderBinding {
                            key_id: key_id.to_owned(),
                            header: header.clone(),
                        });
                    }
                }
                Ok(())
            })
            .with("excluded_paths", |c: &Self| {
                match c.excluded_paths.iter().find(|p| !p.starts_with('/')) {
                    Some(path) => Err(GuardError::Config(format!(
                        "excluded path must start with '/': {path}"
                    ))),
                    None => Ok(()),
                }
            })
            .with("activity_stream_credentials", |c: &Self| {
                if c.activity_stream_access_key_id.is_empty() {
                    return Err(GuardError::Config(
                        "ACTIVITY_STREAM_ACCESS_KEY_ID is required".to_owned(),
                    ));
                }
                if c.activity_stream_secret_access_key.is_empty() {
                    return Err(GuardError::EmptySecret("activity-stream".to_owned()));
                }
                Ok(())
            })
            .with("nonce_window", |c: &Self| {
                if c.nonce_expiry_seconds == 0 {
                    return Err(GuardError::Config(
                        "nonce expiry window must be positive".to_owned(),
                    ));
                }
                Ok(())
            })
            .with("page_size", |c: &Self| {
                if c.activity_stream_page_size == 0 {
                    return Err(GuardError::Config(
                        "activity stream page size must be positive".to_owned(),
                    ));
                }
                Ok(())
            })
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Parse a comma separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// RFC 7230 token characters.
fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}
