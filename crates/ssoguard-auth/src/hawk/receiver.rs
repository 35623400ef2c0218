//! Receiver side of the Hawk exchange.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use ssoguard_core::{GuardConfig, KeyId, Secret};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use url::Url;

use super::HawkError;
use super::header::{RequestHeader, render};
use super::mac::{MacInput, MacKind, calculate_mac, calculate_payload_hash};
use crate::error::{AuthFailure, INCORRECT_CREDENTIALS_MESSAGE, NO_CREDENTIALS_MESSAGE, StoreError};
use crate::nonce::NonceStore;
use crate::signature::full_path;

const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

/// A Hawk credentials pair. The algorithm is always SHA-256.
#[derive(Debug, Clone)]
pub struct HawkCredentials {
    /// Public credentials id.
    pub id: String,
    /// Shared key.
    pub key: Secret,
}

impl HawkCredentials {
    /// Create a credentials pair.
    #[must_use]
    pub fn new(id: impl Into<String>, key: Secret) -> Self {
        Self { id: id.into(), key }
    }
}

/// The parts of a request a Hawk MAC covers.
#[derive(Debug, Clone)]
pub struct HawkRequest {
    /// Request method.
    pub method: String,
    /// Path plus query string, as received.
    pub resource: String,
    /// Host the client addressed.
    pub host: String,
    /// Port the client addressed, explicit or the scheme default.
    pub port: u16,
    /// `Content-Type` header, empty when absent.
    pub content_type: String,
    /// Raw request body.
    pub content: Vec<u8>,
    /// `Authorization` header, if present.
    pub authorization: Option<String>,
}

impl HawkRequest {
    /// Reconstruct the addressed URL of a request received behind a proxy.
    ///
    /// The host is taken from `X-Forwarded-Host`, then `Host`, then the
    /// request URI. The scheme (for the default port) comes from
    /// `X-Forwarded-Proto`, then the request URI, defaulting to `http`.
    pub fn from_parts(parts: &http::request::Parts, body: &[u8]) -> Result<Self, HawkError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let authority = header("x-forwarded-host")
            .or_else(|| header(HOST.as_str()))
            .or_else(|| parts.uri.authority().map(http::uri::Authority::as_str))
            .ok_or_else(|| HawkError::InvalidUrl("no host".to_owned()))?;
        let scheme = header("x-forwarded-proto")
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http");

        let url = Url::parse(&format!("{scheme}://{authority}/"))
            .map_err(|e| HawkError::InvalidUrl(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| HawkError::InvalidUrl(format!("no host in {url}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HawkError::InvalidUrl(format!("no port for {url}")))?;

        Ok(Self {
            method: parts.method.as_str().to_owned(),
            resource: full_path(parts).to_owned(),
            host: host.to_owned(),
            port,
            content_type: header(CONTENT_TYPE.as_str()).unwrap_or_default().to_owned(),
            content: body.to_vec(),
            authorization: parts
                .headers
                .get(AUTHORIZATION)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
        })
    }
}

/// Proof of a verified request, used to sign the response.
#[derive(Debug, Clone)]
pub struct HawkReceipt {
    key: Secret,
    id: String,
    ts: i64,
    nonce: String,
    method: String,
    resource: String,
    host: String,
    port: u16,
}

impl HawkReceipt {
    /// The credentials id the request was made with.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `Server-Authorization` value for a response with this content.
    #[must_use]
    pub fn respond(&self, content: &[u8], content_type: &str) -> String {
        let hash = calculate_payload_hash(content, content_type);
        let mac = calculate_mac(
            self.key.expose().as_bytes(),
            &MacInput {
                kind: MacKind::Response,
                ts: self.ts,
                nonce: &self.nonce,
                method: &self.method,
                resource: &self.resource,
                host: &self.host,
                port: self.port,
                hash: Some(&hash),
                ext: None,
                app: None,
                dlg: None,
            },
        );
        render(&[("mac", mac.as_str()), ("hash", hash.as_str())])
    }
}

/// Verifies Hawk-authenticated requests against one static credentials pair.
#[derive(Debug, Clone)]
pub struct HawkVerifier {
    credentials: HawkCredentials,
    window_secs: u64,
    nonces: Arc<dyn NonceStore>,
    store_timeout: Duration,
}

impl HawkVerifier {
    /// Create a verifier with a 60 second window.
    #[must_use]
    pub fn new(credentials: HawkCredentials, nonces: Arc<dyn NonceStore>) -> Self {
        Self {
            credentials,
            window_secs: DEFAULT_WINDOW_SECS,
            nonces,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Build the activity-stream verifier from configuration.
    #[must_use]
    pub fn from_config(config: &GuardConfig, nonces: Arc<dyn NonceStore>) -> Self {
        debug!(key_id = KeyId::ACTIVITY_STREAM, "building hawk verifier");
        Self::new(
            HawkCredentials::new(
                config.activity_stream_access_key_id.clone(),
                Secret::new(config.activity_stream_secret_access_key.clone()),
            ),
            nonces,
        )
        .with_window(config.nonce_expiry_seconds)
        .with_store_timeout(Duration::from_millis(config.store_timeout_ms))
    }

    /// Set the timestamp freshness window, in seconds.
    #[must_use]
    pub fn with_window(mut self, window_secs: u64) -> Self {
        self.window_secs = window_secs;
        self
    }

    /// Set the upper bound on a nonce-store lookup.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Authenticate an HTTP request.
    ///
    /// No `Authorization` header yields [`AuthFailure::MissingCredentials`];
    /// every other failure yields the one generic
    /// [`AuthFailure::InvalidCredentials`].
    pub async fn authenticate_request(
        &self,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> Result<HawkReceipt, AuthFailure> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Err(AuthFailure::MissingCredentials(NO_CREDENTIALS_MESSAGE));
        }
        let request = HawkRequest::from_parts(parts, body).map_err(reject)?;
        self.authenticate(&request).await
    }

    /// Authenticate a request against the current time.
    pub async fn authenticate(&self, request: &HawkRequest) -> Result<HawkReceipt, AuthFailure> {
        self.authenticate_at(request, Utc::now().timestamp()).await
    }

    /// Authenticate a request against an explicit Unix time.
    pub async fn authenticate_at(
        &self,
        request: &HawkRequest,
        now: i64,
    ) -> Result<HawkReceipt, AuthFailure> {
        if request.authorization.is_none() {
            return Err(AuthFailure::MissingCredentials(NO_CREDENTIALS_MESSAGE));
        }
        self.receive(request, now).await.map_err(reject)
    }

    /// Verify a request, returning the precise cause on failure.
    pub async fn receive(&self, request: &HawkRequest, now: i64) -> Result<HawkReceipt, HawkError> {
        let authorization = request
            .authorization
            .as_deref()
            .ok_or_else(|| HawkError::MalformedHeader("missing Authorization".to_owned()))?;
        let header = RequestHeader::parse(authorization)?;

        let id_matches: bool = self
            .credentials
            .id
            .as_bytes()
            .ct_eq(header.id.as_bytes())
            .into();
        if !id_matches {
            return Err(HawkError::UnknownId(header.id));
        }

        let expected_mac = calculate_mac(
            self.credentials.key.expose().as_bytes(),
            &MacInput {
                kind: MacKind::Header,
                ts: header.ts,
                nonce: &header.nonce,
                method: &request.method,
                resource: &request.resource,
                host: &request.host,
                port: request.port,
                hash: header.hash.as_deref(),
                ext: header.ext.as_deref(),
                app: header.app.as_deref(),
                dlg: header.dlg.as_deref(),
            },
        );
        if !bool::from(expected_mac.as_bytes().ct_eq(header.mac.as_bytes())) {
            return Err(HawkError::MacMismatch);
        }

        let hash = header.hash.as_deref().ok_or(HawkError::MissingHash)?;
        let expected_hash = calculate_payload_hash(&request.content, &request.content_type);
        if !bool::from(expected_hash.as_bytes().ct_eq(hash.as_bytes())) {
            return Err(HawkError::MisComputedContentHash);
        }

        let skew = now.abs_diff(header.ts);
        if skew > self.window_secs {
            return Err(HawkError::StaleTimestamp {
                skew,
                window: self.window_secs,
            });
        }

        let seen = tokio::time::timeout(
            self.store_timeout,
            self.nonces.seen_before(&header.id, &header.nonce, header.ts),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        if seen {
            return Err(HawkError::Replay(header.nonce));
        }

        debug!(id = %header.id, ts = header.ts, "hawk request authenticated");
        Ok(HawkReceipt {
            key: self.credentials.key.clone(),
            id: header.id,
            ts: header.ts,
            nonce: header.nonce,
            method: request.method.clone(),
            resource: request.resource.clone(),
            host: request.host.clone(),
            port: request.port,
        })
    }
}

fn reject(err: HawkError) -> AuthFailure {
    warn!(error = %err, "hawk authentication failed");
    AuthFailure::InvalidCredentials(INCORRECT_CREDENTIALS_MESSAGE)
}
