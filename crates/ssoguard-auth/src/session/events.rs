//! Session lifecycle events.
//!
//! The repository publishes an event whenever a session is created or
//! invalidated. Subscribers react synchronously on the publishing task and
//! must not block.

use std::sync::Arc;

use ssoguard_core::UserId;
use tracing::debug;

use super::store::CachedSessionStore;

/// Something that happened to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was created for a user.
    Created {
        /// The new session key.
        session_key: String,
        /// The user the session authenticates.
        user_id: UserId,
    },
    /// A session was invalidated (logout or explicit revocation).
    Invalidated {
        /// The invalidated session key.
        session_key: String,
    },
}

impl SessionEvent {
    /// The session the event concerns.
    #[must_use]
    pub fn session_key(&self) -> &str {
        match self {
            Self::Created { session_key, .. } | Self::Invalidated { session_key } => session_key,
        }
    }
}

/// Receives session events.
pub trait EventSubscriber: Send + Sync + std::fmt::Debug {
    /// Handle one event.
    fn on_event(&self, event: &SessionEvent);
}

/// Evicts invalidated sessions from a [`CachedSessionStore`].
#[derive(Debug, Clone)]
pub struct CacheInvalidator {
    cache: Arc<CachedSessionStore>,
}

impl CacheInvalidator {
    /// Invalidate entries of `cache`.
    #[must_use]
    pub fn new(cache: Arc<CachedSessionStore>) -> Self {
        Self { cache }
    }
}

impl EventSubscriber for CacheInvalidator {
    fn on_event(&self, event: &SessionEvent) {
        if let SessionEvent::Invalidated { session_key } = event {
            let evicted = self.cache.evict(session_key);
            debug!(evicted, "session invalidated");
        }
    }
}
