//! In-memory session repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use ssoguard_core::UserId;
use tracing::{debug, info};

use super::events::{EventSubscriber, SessionEvent};
use super::store::{SessionRecord, SessionStore};
use crate::error::StoreError;

/// Owns session records and publishes their lifecycle.
#[derive(Debug, Default)]
pub struct MemorySessionRepository {
    sessions: DashMap<String, SessionRecord>,
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl MemorySessionRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for future events.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Create a session for `user_id` lasting `ttl`, returning its key.
    pub fn create(&self, user_id: UserId, ttl: Duration) -> String {
        let session_key = uuid::Uuid::new_v4().simple().to_string();
        let record = SessionRecord::for_user(session_key.clone(), user_id, Utc::now() + ttl);
        self.sessions.insert(session_key.clone(), record);
        info!(user_id = %user_id, "session created");
        self.publish(&SessionEvent::Created {
            session_key: session_key.clone(),
            user_id,
        });
        session_key
    }

    /// Store a prepared record as-is. No event is published.
    pub fn insert(&self, record: SessionRecord) {
        self.sessions.insert(record.session_key.clone(), record);
    }

    /// Remove a session. Returns whether it existed.
    pub fn invalidate(&self, session_key: &str) -> bool {
        let existed = self.sessions.remove(session_key).is_some();
        if existed {
            info!("session invalidated");
            self.publish(&SessionEvent::Invalidated {
                session_key: session_key.to_owned(),
            });
        }
        existed
    }

    /// Drop sessions that expired before `now`.
    pub fn clear_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, record| record.is_live(now));
        before.saturating_sub(self.sessions.len())
    }

    fn publish(&self, event: &SessionEvent) {
        let subscribers = self.subscribers.read();
        debug!(subscribers = subscribers.len(), "publishing session event");
        for subscriber in subscribers.iter() {
            subscriber.on_event(event);
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionRepository {
    async fn get_session(
        &self,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .get(session_key)
            .filter(|record| record.is_live(now))
            .map(|record| record.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::session::events::CacheInvalidator;
    use crate::session::store::CachedSessionStore;

    #[derive(Debug, Default)]
    struct Recorder {
        events: Mutex<Vec<SessionEvent>>,
    }

    impl EventSubscriber for Recorder {
        fn on_event(&self, event: &SessionEvent) {
            self.events.lock().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_should_create_and_fetch_session() {
        let repo = MemorySessionRepository::new();
        let key = repo.create(UserId::new(1), Duration::hours(1));
        let record = repo
            .get_session(&key, Utc::now())
            .await
            .expect("memory")
            .expect("present");
        assert_eq!(record.user_id(), Some(UserId::new(1)));
    }

    #[tokio::test]
    async fn test_should_hide_expired_session() {
        let repo = MemorySessionRepository::new();
        let key = repo.create(UserId::new(1), Duration::seconds(-1));
        assert!(repo.get_session(&key, Utc::now()).await.expect("memory").is_none());
        assert_eq!(repo.clear_expired(Utc::now()), 1);
    }

    #[test]
    fn test_should_publish_lifecycle_events() {
        let repo = MemorySessionRepository::new();
        let recorder = Arc::new(Recorder::default());
        repo.subscribe(recorder.clone());

        let key = repo.create(UserId::new(5), Duration::hours(1));
        assert!(repo.invalidate(&key));
        assert!(!repo.invalidate(&key));

        let events = recorder.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            SessionEvent::Created {
                session_key: key.clone(),
                user_id: UserId::new(5)
            }
        );
        assert_eq!(events[1], SessionEvent::Invalidated { session_key: key });
    }

    #[tokio::test]
    async fn test_should_evict_cache_on_invalidation() {
        let repo = Arc::new(MemorySessionRepository::new());
        let cache = Arc::new(CachedSessionStore::new(repo.clone()));
        repo.subscribe(Arc::new(CacheInvalidator::new(cache.clone())));

        let key = repo.create(UserId::new(1), Duration::hours(1));
        assert!(cache.get_session(&key, Utc::now()).await.expect("memory").is_some());
        assert_eq!(cache.cached(), 1);

        repo.invalidate(&key);
        assert_eq!(cache.cached(), 0);
        assert!(cache.get_session(&key, Utc::now()).await.expect("memory").is_none());
    }
}
