//! The gateway HTTP service implementing hyper's `Service` trait.
//!
//! [`GuardHttpService`] runs every request through one pipeline:
//!
//! 1. Health check interception (`GET /healthcheck/`)
//! 2. Request body collection
//! 3. Symmetric signature rejection for non-excluded paths
//! 4. Route resolution
//! 5. Per-route authentication (`SSO_SESSION_ID` or Hawk plus `X-Forwarded-For`)
//! 6. Dispatch to the [`GuardHandler`]
//! 7. Common response headers (`x-request-id`, `Server`) and the
//!    `sso_display_logged_in` cookie
//!
//! Answers to `HEAD` carry the headers of the matching `GET` and no body.

use std::collections::HashSet;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{
    ALLOW, AUTHORIZATION, CONTENT_TYPE, HOST, HeaderValue, SET_COOKIE, WWW_AUTHENTICATE,
};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ssoguard_auth::error::NO_CREDENTIALS_MESSAGE;
use ssoguard_auth::{
    AuthFailure, ForwardedForCheck, HawkVerifier, NonceStore, RedirectValidator,
    SessionAuthenticator, SessionPrincipal, SessionStore, SignatureRegistry, UserStore,
};
use ssoguard_core::{GuardConfig, GuardResult, RejectionVariant};

use crate::activity::parse_cursor;
use crate::body::GuardResponseBody;
use crate::dispatch::{GuardHandler, HandlerError, PageRequest};
use crate::router::{Resolution, Route, resolve};

/// Name of the cookie telling front ends whether the visitor is logged in.
pub const LOGGED_IN_COOKIE: &str = "sso_display_logged_in";

const JSON: &str = "application/json";

/// Attributes of the `sso_display_logged_in` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedInCookie {
    /// `Domain` attribute.
    pub domain: Option<String>,
    /// `Max-Age` attribute, in seconds.
    pub max_age: u64,
    /// Whether to add the `Secure` attribute.
    pub secure: bool,
}

impl LoggedInCookie {
    /// The `Set-Cookie` value for a response.
    #[must_use]
    pub fn render(&self, logged_in: bool) -> String {
        let mut cookie = format!(
            "{LOGGED_IN_COOKIE}={logged_in}; Max-Age={}; Path=/",
            self.max_age
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl Default for LoggedInCookie {
    fn default() -> Self {
        Self {
            domain: None,
            max_age: 1_209_600,
            secure: true,
        }
    }
}

/// Configuration for the gateway service: every verifier, built once.
#[derive(Debug, Clone)]
pub struct GuardHttpConfig {
    /// Symmetric signature secrets and their headers.
    pub signatures: SignatureRegistry,
    /// Accept every request without a signature check (development only).
    pub skip_signature_validation: bool,
    /// Response for a failed signature check.
    pub rejection: RejectionVariant,
    /// Paths exempt from the signature check.
    pub excluded_paths: HashSet<String>,
    /// `SSO_SESSION_ID` authenticator.
    pub sessions: SessionAuthenticator,
    /// Hawk verifier for the activity stream.
    pub hawk: HawkVerifier,
    /// `X-Forwarded-For` allow-list for the activity stream.
    pub forwarded_for: ForwardedForCheck,
    /// Redirect target allow-list.
    pub redirects: RedirectValidator,
    /// `sso_display_logged_in` cookie attributes.
    pub cookie: LoggedInCookie,
}

impl GuardHttpConfig {
    /// Build every verifier from a validated [`GuardConfig`].
    pub fn from_config(
        config: &GuardConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        nonces: Arc<dyn NonceStore>,
    ) -> GuardResult<Self> {
        Ok(Self {
            signatures: SignatureRegistry::from_config(config)?,
            skip_signature_validation: config.skip_signature_validation,
            rejection: config.rejection_variant,
            excluded_paths: config.excluded_paths.iter().cloned().collect(),
            sessions: SessionAuthenticator::from_config(config, sessions, users),
            hawk: HawkVerifier::from_config(config, nonces),
            forwarded_for: ForwardedForCheck::from_config(config),
            redirects: RedirectValidator::from_config(config)?,
            cookie: LoggedInCookie {
                domain: config.session_cookie_domain.clone(),
                max_age: config.session_cookie_age,
                secure: config.session_cookie_secure,
            },
        })
    }

    /// Whether a request passes the symmetric signature check.
    ///
    /// A request passes when its path is excluded, validation is skipped, or
    /// it verifies against any registered namespace.
    #[must_use]
    pub fn passes_signature_check(&self, parts: &http::request::Parts, body: &[u8]) -> bool {
        if self.skip_signature_validation || self.excluded_paths.contains(parts.uri.path()) {
            return true;
        }
        self.signatures
            .key_ids()
            .any(|key_id| self.signatures.verify_namespace(parts, body, key_id))
    }
}

/// The gateway HTTP service.
///
/// # Type Parameters
///
/// - `H`: The business logic handler implementing [`GuardHandler`].
#[derive(Debug)]
pub struct GuardHttpService<H: GuardHandler> {
    handler: Arc<H>,
    config: Arc<GuardHttpConfig>,
}

impl<H: GuardHandler> GuardHttpService<H> {
    /// Create a new service with the given handler and configuration.
    #[must_use]
    pub fn new(handler: H, config: GuardHttpConfig) -> Self {
        Self::from_shared(Arc::new(handler), config)
    }

    /// Create a new service from an `Arc<H>` handler and configuration.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, config: GuardHttpConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }

    /// Run a buffered request through the pipeline.
    pub async fn handle(&self, req: http::Request<Bytes>) -> http::Response<GuardResponseBody> {
        let request_id = Uuid::new_v4().to_string();
        let (parts, body) = req.into_parts();
        let is_head = parts.method == http::Method::HEAD;
        let (mut response, logged_in) =
            process_request(parts, body, self.handler.as_ref(), &self.config).await;
        if is_head {
            *response.body_mut() = GuardResponseBody::bodiless();
        }
        add_common_headers(response, &request_id, &self.config.cookie, logged_in)
    }
}

impl<H: GuardHandler> Clone for GuardHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: GuardHandler> Service<http::Request<Incoming>> for GuardHttpService<H> {
    type Response = http::Response<GuardResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();

        Box::pin(async move {
            let (parts, incoming) = req.into_parts();
            let body = match incoming.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    error!(error = %e, "failed to read request body");
                    let response = json_response(
                        http::StatusCode::BAD_REQUEST,
                        &json!({ "detail": "Failed to read request body." }),
                    );
                    let request_id = Uuid::new_v4().to_string();
                    return Ok(add_common_headers(
                        response,
                        &request_id,
                        &service.config.cookie,
                        false,
                    ));
                }
            };
            Ok(service.handle(http::Request::from_parts(parts, body)).await)
        })
    }
}

/// Process a request, returning the response and whether a session was
/// authenticated along the way.
async fn process_request<H: GuardHandler>(
    parts: http::request::Parts,
    body: Bytes,
    handler: &H,
    config: &GuardHttpConfig,
) -> (http::Response<GuardResponseBody>, bool) {
    let path = parts.uri.path().to_owned();
    debug!(method = %parts.method, path = %path, "received request");

    if is_health_check(&parts.method, &path) {
        return (health_check_response(), false);
    }

    if !config.passes_signature_check(&parts, &body) {
        warn!(path = %path, "signature check failed");
        return (signature_rejection_response(config.rejection), false);
    }

    let route = match resolve(&parts.method, &path) {
        Resolution::Found(route) => route,
        Resolution::MethodNotAllowed(route) => {
            debug!(route = %route, method = %parts.method, "method not allowed");
            return (method_not_allowed_response(&parts.method), false);
        }
        Resolution::NotFound => {
            return (
                json_response(http::StatusCode::NOT_FOUND, &json!({ "detail": "Not found." })),
                false,
            );
        }
    };

    match route {
        // Only reachable for `HEAD /healthcheck/`.
        Route::HealthCheck => (health_check_response(), false),
        Route::ActivityStream | Route::ActivityStreamUsers => (
            serve_activity_stream(route, &parts, &body, handler, config).await,
            false,
        ),
        Route::SessionUser | Route::ValidateRedirect => {
            let authorization = parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            let session = config.sessions.authenticate(authorization).await;
            let logged_in = matches!(session, Ok(Some(_)));
            let response = if route == Route::SessionUser {
                serve_session_user(session, handler).await
            } else {
                serve_validate_redirect(&parts, &config.redirects)
            };
            (response, logged_in)
        }
    }
}

async fn serve_session_user<H: GuardHandler>(
    session: Result<Option<SessionPrincipal>, AuthFailure>,
    handler: &H,
) -> http::Response<GuardResponseBody> {
    let principal = match session {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            return auth_failure_response(
                AuthFailure::MissingCredentials(NO_CREDENTIALS_MESSAGE),
                SessionAuthenticator::authenticate_header(),
            );
        }
        Err(failure) => {
            return auth_failure_response(failure, SessionAuthenticator::authenticate_header());
        }
    };
    match handler.session_user(principal).await {
        Ok(payload) => json_response(http::StatusCode::OK, &payload),
        Err(e) => handler_error_response(&e),
    }
}

fn serve_validate_redirect(
    parts: &http::request::Parts,
    redirects: &RedirectValidator,
) -> http::Response<GuardResponseBody> {
    let Some(target) = redirects.target(parts.uri.query()) else {
        return json_response(
            http::StatusCode::BAD_REQUEST,
            &json!({ "detail": format!("Missing {} parameter.", redirects.field_name()) }),
        );
    };
    let valid = redirects.is_valid_redirect(&target);
    debug!(target = %target, valid, "checked redirect target");
    json_response(
        http::StatusCode::OK,
        &json!({ "next": target, "valid": valid }),
    )
}

async fn serve_activity_stream<H: GuardHandler>(
    route: Route,
    parts: &http::request::Parts,
    body: &[u8],
    handler: &H,
    config: &GuardHttpConfig,
) -> http::Response<GuardResponseBody> {
    // The network check runs before Hawk so a denied request never spends its nonce.
    if !parts.headers.contains_key(AUTHORIZATION) {
        return auth_failure_response(
            AuthFailure::MissingCredentials(NO_CREDENTIALS_MESSAGE),
            "Hawk",
        );
    }
    let forwarded_for = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    if let Err(failure) = config.forwarded_for.check(forwarded_for) {
        return auth_failure_response(failure, "Hawk");
    }
    let receipt = match config.hawk.authenticate_request(parts, body).await {
        Ok(receipt) => receipt,
        Err(failure) => return auth_failure_response(failure, "Hawk"),
    };
    info!(key_id = receipt.id(), route = %route, "activity stream request authenticated");

    let payload = if route == Route::ActivityStreamUsers {
        match parse_cursor(parts.uri.query()) {
            Ok(cursor) => {
                handler
                    .activity_stream_users(PageRequest {
                        cursor,
                        base_url: base_url(parts),
                    })
                    .await
            }
            Err(e) => Err(e),
        }
    } else {
        handler.activity_stream().await
    };

    match payload {
        Ok(payload) => {
            let content = Bytes::from(payload.to_string());
            let server_authorization = receipt.respond(&content, JSON);
            let mut response = bytes_response(http::StatusCode::OK, JSON, content);
            if let Ok(hv) = HeaderValue::from_str(&server_authorization) {
                response.headers_mut().insert("Server-Authorization", hv);
            }
            response
        }
        Err(e) => handler_error_response(&e),
    }
}

/// Absolute URL of the request without its query, as seen by the client.
fn base_url(parts: &http::request::Parts) -> String {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let scheme = header("x-forwarded-proto")
        .or_else(|| parts.uri.scheme_str())
        .unwrap_or("http");
    let host = header("x-forwarded-host")
        .or_else(|| header(HOST.as_str()))
        .or_else(|| parts.uri.authority().map(http::uri::Authority::as_str))
        .unwrap_or("localhost");
    format!("{scheme}://{host}{}", parts.uri.path())
}

/// Check if the request is a health check.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == crate::router::HEALTH_CHECK_PATH
}

/// Produce a health check response.
fn health_check_response() -> http::Response<GuardResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(CONTENT_TYPE, JSON)
        .body(GuardResponseBody::from_string(
            r#"{"status":"ok","service":"ssoguard"}"#,
        ))
        .expect("static health response should be valid")
}

/// Produce the configured signature rejection.
fn signature_rejection_response(variant: RejectionVariant) -> http::Response<GuardResponseBody> {
    http::Response::builder()
        .status(variant.status_code())
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(GuardResponseBody::from_string(variant.body()))
        .expect("static rejection response should be valid")
}

fn method_not_allowed_response(method: &http::Method) -> http::Response<GuardResponseBody> {
    let mut response = json_response(
        http::StatusCode::METHOD_NOT_ALLOWED,
        &json!({ "detail": format!("Method \"{method}\" not allowed.") }),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

fn auth_failure_response(
    failure: AuthFailure,
    challenge: &'static str,
) -> http::Response<GuardResponseBody> {
    let status = http::StatusCode::from_u16(failure.status_code())
        .unwrap_or(http::StatusCode::UNAUTHORIZED);
    let mut response = json_response(status, &json!({ "detail": failure.detail() }));
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    response
}

fn handler_error_response(e: &HandlerError) -> http::Response<GuardResponseBody> {
    if matches!(e, HandlerError::Store(_)) {
        error!(error = %e, "handler failed");
    } else {
        debug!(error = %e, "handler rejected request");
    }
    json_response(e.status_code(), &json!({ "detail": e.detail() }))
}

fn json_response(status: http::StatusCode, payload: &Value) -> http::Response<GuardResponseBody> {
    bytes_response(status, JSON, Bytes::from(payload.to_string()))
}

fn bytes_response(
    status: http::StatusCode,
    content_type: &'static str,
    content: Bytes,
) -> http::Response<GuardResponseBody> {
    let mut response = http::Response::new(GuardResponseBody::from_bytes(content));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Add common response headers and the logged-in cookie to every response.
fn add_common_headers(
    mut response: http::Response<GuardResponseBody>,
    request_id: &str,
    cookie: &LoggedInCookie,
    logged_in: bool,
) -> http::Response<GuardResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", hv);
    }

    headers.insert("Server", HeaderValue::from_static("ssoguard"));

    if let Ok(hv) = HeaderValue::from_str(&cookie.render(logged_in)) {
        headers.append(SET_COOKIE, hv);
    }

    response
}
