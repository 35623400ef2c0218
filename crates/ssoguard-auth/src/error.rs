//! Error types for request authentication.
//!
//! [`AuthFailure`] is what callers see: one fixed message per scheme so a
//! client cannot tell which part of a check failed. [`StoreError`] covers the
//! external collaborators (session store, user store, nonce store); every
//! store error is turned into an [`AuthFailure::InvalidCredentials`] at the
//! authenticator boundary.

/// Message for a Hawk-protected request without an `Authorization` header.
pub const NO_CREDENTIALS_MESSAGE: &str = "Authentication credentials were not provided.";

/// Message for every rejected Hawk credential, whatever the cause.
pub const INCORRECT_CREDENTIALS_MESSAGE: &str = "Incorrect authentication credentials.";

/// Message for an unknown, expired or orphaned session id.
pub const INVALID_SESSION_MESSAGE: &str = "Invalid session id";

/// Message for an `SSO_SESSION_ID` header with the wrong number of tokens.
pub const BAD_SESSION_HEADER_MESSAGE: &str = "Invalid SSO_SESSION_ID header.";

/// Message for a request whose `X-Forwarded-For` chain is not allow-listed.
pub const PUBLIC_NETWORK_DENIED_MESSAGE: &str = "Public network access denied";

/// A request-time authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// No authentication material was supplied at all.
    #[error("{0}")]
    MissingCredentials(&'static str),

    /// Material was supplied but did not verify.
    #[error("{0}")]
    InvalidCredentials(&'static str),

    /// Credentials verified but the caller's network origin is not allowed.
    #[error("{0}")]
    Forbidden(&'static str),
}

impl AuthFailure {
    /// The public message for this failure.
    #[must_use]
    pub const fn detail(self) -> &'static str {
        match self {
            Self::MissingCredentials(msg) | Self::InvalidCredentials(msg) | Self::Forbidden(msg) => {
                msg
            }
        }
    }

    /// HTTP status for this failure. All authentication failures are `401`.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        401
    }
}

/// Failure of an external store consulted during authentication.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store did not answer within the configured bound.
    #[error("store lookup timed out")]
    Timeout,

    /// The store answered with an error.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
