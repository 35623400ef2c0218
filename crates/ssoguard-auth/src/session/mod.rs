//! Session-token authentication.
//!
//! Clients authenticate by passing an SSO session key in the `Authorization`
//! header, prefixed with the `SSO_SESSION_ID` keyword:
//!
//! ```text
//! Authorization: SSO_SESSION_ID 401f7ac837da42b97f613d789819ff93537bee6a
//! ```
//!
//! A header that does not start with the keyword is not for this scheme and
//! yields an anonymous result so other schemes can run. The authenticator
//! never writes to the session store.

pub mod events;
pub mod repository;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ssoguard_core::{GuardConfig, User};
use tracing::{debug, warn};

pub use events::{CacheInvalidator, EventSubscriber, SessionEvent};
pub use repository::MemorySessionRepository;
pub use store::{CachedSessionStore, SessionRecord, SessionStore};

use crate::error::{AuthFailure, BAD_SESSION_HEADER_MESSAGE, INVALID_SESSION_MESSAGE, StoreError};
use crate::users::UserStore;

/// An authenticated session and the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPrincipal {
    /// The session's user.
    pub user: User,
    /// The presented session key.
    pub session_key: String,
}

/// Resolves `SSO_SESSION_ID` credentials against the session and user stores.
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl SessionAuthenticator {
    /// Authorization keyword for this scheme.
    pub const KEYWORD: &'static str = "SSO_SESSION_ID";

    /// Create an authenticator with a 500 ms bound on each store call.
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, users: Arc<dyn UserStore>) -> Self {
        Self {
            sessions,
            users,
            timeout: Duration::from_millis(500),
        }
    }

    /// Create an authenticator using the configured store timeout.
    #[must_use]
    pub fn from_config(
        config: &GuardConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self::new(sessions, users).with_timeout(Duration::from_millis(config.store_timeout_ms))
    }

    /// Set the bound on each store call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value for the `WWW-Authenticate` header on a failed attempt.
    #[must_use]
    pub const fn authenticate_header() -> &'static str {
        Self::KEYWORD
    }

    /// Authenticate an `Authorization` header value.
    ///
    /// Returns `Ok(None)` when the header is absent or belongs to another
    /// scheme.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<Option<SessionPrincipal>, AuthFailure> {
        let Some(authorization) = authorization else {
            return Ok(None);
        };
        let tokens: Vec<&str> = authorization.split_whitespace().collect();
        match tokens.as_slice() {
            [keyword, session_key] if *keyword == Self::KEYWORD => {
                self.authenticate_credentials(session_key).await.map(Some)
            }
            [keyword, ..] if *keyword == Self::KEYWORD => {
                warn!(tokens = tokens.len(), "malformed SSO_SESSION_ID header");
                Err(AuthFailure::InvalidCredentials(BAD_SESSION_HEADER_MESSAGE))
            }
            _ => Ok(None),
        }
    }

    /// Resolve a session key to its principal.
    pub async fn authenticate_credentials(
        &self,
        session_key: &str,
    ) -> Result<SessionPrincipal, AuthFailure> {
        match self.lookup(session_key).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "session authenticated");
                Ok(SessionPrincipal {
                    user,
                    session_key: session_key.to_owned(),
                })
            }
            Ok(None) => {
                warn!("unknown, expired or orphaned session");
                Err(AuthFailure::InvalidCredentials(INVALID_SESSION_MESSAGE))
            }
            Err(err) => {
                warn!(error = %err, "session lookup failed");
                Err(AuthFailure::InvalidCredentials(INVALID_SESSION_MESSAGE))
            }
        }
    }

    async fn lookup(&self, session_key: &str) -> Result<Option<User>, StoreError> {
        let session = tokio::time::timeout(
            self.timeout,
            self.sessions.get_session(session_key, Utc::now()),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        let Some(user_id) = session.as_ref().and_then(SessionRecord::user_id) else {
            return Ok(None);
        };
        tokio::time::timeout(self.timeout, self.users.get_user(user_id))
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}
