//! Session records and the stores that hold them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use ssoguard_core::UserId;
use tracing::debug;

use crate::error::StoreError;

/// Session payload key holding the authenticated user's primary key.
pub const AUTH_USER_ID_KEY: &str = "_auth_user_id";

/// A stored login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Opaque session key presented by clients.
    pub session_key: String,
    /// Serialized JSON payload.
    pub session_data: String,
    /// Instant after which the session is no longer valid.
    pub expire_date: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a session for `user_id` expiring at `expire_date`.
    #[must_use]
    pub fn for_user(session_key: impl Into<String>, user_id: UserId, expire_date: DateTime<Utc>) -> Self {
        let mut payload = serde_json::Map::new();
        payload.insert(AUTH_USER_ID_KEY.to_owned(), Value::String(user_id.to_string()));
        Self {
            session_key: session_key.into(),
            session_data: Value::Object(payload).to_string(),
            expire_date,
        }
    }

    /// Whether the session is still valid at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expire_date > now
    }

    /// The authenticated user id, if the payload decodes and carries one.
    ///
    /// Both string and integer encodings of the id are accepted.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        let payload: Value = match serde_json::from_str(&self.session_data) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, "undecodable session payload");
                return None;
            }
        };
        match payload.get(AUTH_USER_ID_KEY)? {
            Value::String(id) => id.parse().ok(),
            Value::Number(id) => id.as_i64().map(UserId::new),
            _ => None,
        }
    }
}

/// Read access to stored sessions.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// The session with `session_key`, only if it has not expired at `now`.
    async fn get_session(
        &self,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError>;
}

/// Read-through cache in front of another [`SessionStore`].
///
/// Entries are evicted explicitly (see
/// [`CacheInvalidator`](super::events::CacheInvalidator)) and are never served
/// past their expiry. Every eviction advances an epoch; a lookup that was in
/// flight across an eviction does not fill the cache.
#[derive(Debug)]
pub struct CachedSessionStore {
    inner: Arc<dyn SessionStore>,
    cache: DashMap<String, SessionRecord>,
    epoch: RwLock<u64>,
}

impl CachedSessionStore {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn SessionStore>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            epoch: RwLock::new(0),
        }
    }

    /// Drop a cached session.
    pub fn evict(&self, session_key: &str) -> bool {
        let mut epoch = self.epoch.write();
        *epoch = epoch.wrapping_add(1);
        let evicted = self.cache.remove(session_key).is_some();
        drop(epoch);
        if evicted {
            debug!("evicted cached session");
        }
        evicted
    }

    /// Number of cached sessions.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl SessionStore for CachedSessionStore {
    async fn get_session(
        &self,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        if let Some(record) = self.cache.get(session_key) {
            if record.is_live(now) {
                return Ok(Some(record.clone()));
            }
        }
        self.cache.remove(session_key);

        let started = *self.epoch.read();
        let record = self.inner.get_session(session_key, now).await?;
        if let Some(record) = &record {
            let epoch = self.epoch.read();
            if *epoch == started {
                self.cache.insert(session_key.to_owned(), record.clone());
            } else {
                debug!("session evicted during lookup, not caching");
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Duration;

    use super::*;

    /// Answers after a delay, for as long as the session is live.
    #[derive(Debug)]
    struct SlowStore {
        live: AtomicBool,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl SessionStore for SlowStore {
        async fn get_session(
            &self,
            session_key: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<SessionRecord>, StoreError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.live.load(Ordering::SeqCst).then(|| {
                SessionRecord::for_user(session_key, UserId::new(1), now + Duration::hours(1))
            }))
        }
    }

    fn slow_store(delay_ms: u64) -> Arc<SlowStore> {
        Arc::new(SlowStore {
            live: AtomicBool::new(true),
            delay: std::time::Duration::from_millis(delay_ms),
        })
    }

    fn record(data: &str) -> SessionRecord {
        SessionRecord {
            session_key: "key".to_owned(),
            session_data: data.to_owned(),
            expire_date: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_should_decode_user_id() {
        assert_eq!(record(r#"{"_auth_user_id":"42"}"#).user_id(), Some(UserId::new(42)));
        assert_eq!(record(r#"{"_auth_user_id":7}"#).user_id(), Some(UserId::new(7)));
        let made = SessionRecord::for_user("k", UserId::new(9), Utc::now());
        assert_eq!(made.user_id(), Some(UserId::new(9)));
    }

    #[test]
    fn test_should_not_decode_bad_payloads() {
        assert_eq!(record("not json").user_id(), None);
        assert_eq!(record("{}").user_id(), None);
        assert_eq!(record(r#"{"_auth_user_id":"abc"}"#).user_id(), None);
        assert_eq!(record(r#"{"_auth_user_id":null}"#).user_id(), None);
    }

    #[tokio::test]
    async fn test_should_serve_cached_session_until_evicted() {
        let inner = slow_store(0);
        let cache = CachedSessionStore::new(inner.clone());
        assert!(cache.get_session("k", Utc::now()).await.expect("store ok").is_some());
        assert_eq!(cache.cached(), 1);

        inner.live.store(false, Ordering::SeqCst);
        assert!(cache.get_session("k", Utc::now()).await.expect("store ok").is_some());

        assert!(cache.evict("k"));
        assert!(cache.get_session("k", Utc::now()).await.expect("store ok").is_none());
    }

    #[tokio::test]
    async fn test_should_not_cache_lookup_that_raced_an_eviction() {
        let inner = slow_store(50);
        let cache = Arc::new(CachedSessionStore::new(inner.clone()));

        let lookup = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get_session("k", Utc::now()).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        inner.live.store(false, Ordering::SeqCst);
        cache.evict("k");

        let in_flight = lookup.await.expect("lookup task").expect("store ok");
        assert!(in_flight.is_some());
        assert_eq!(cache.cached(), 0);
        assert!(cache.get_session("k", Utc::now()).await.expect("store ok").is_none());
    }

    #[test]
    fn test_should_report_liveness() {
        let now = Utc::now();
        let mut session = record("{}");
        session.expire_date = now;
        assert!(!session.is_live(now));
        assert!(session.is_live(now - Duration::seconds(1)));
    }
}
