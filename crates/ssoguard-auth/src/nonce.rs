//! Hawk nonce replay stores.
//!
//! A nonce is remembered together with the credentials id and timestamp it
//! arrived with. A header timestamp is acceptable anywhere from one window
//! before to one window after the clock, so a request stays replayable for up
//! to twice the window after it first arrives; nonces are kept that long.
//! Seeing the same triple again inside that span is a replay.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ssoguard_core::NonceBackend;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::StoreError;

/// Insert-if-absent store of recently seen nonces.
#[async_trait]
pub trait NonceStore: Send + Sync + fmt::Debug {
    /// Record `(key_id, nonce, ts)` and report whether it was already present.
    async fn seen_before(&self, key_id: &str, nonce: &str, ts: i64) -> Result<bool, StoreError>;
}

/// Process-local nonce store.
#[derive(Debug)]
pub struct MemoryNonceStore {
    entries: DashMap<String, Instant>,
    retention: Duration,
}

impl MemoryNonceStore {
    /// Create a store for a timestamp freshness window of `window`.
    ///
    /// Nonces are retained for `2 * window` after they are first seen.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retention: window.saturating_mul(2),
        }
    }

    /// How long a nonce is remembered.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// [`NonceStore::seen_before`] against an explicit clock.
    pub fn seen_before_at(&self, key_id: &str, nonce: &str, ts: i64, now: Instant) -> bool {
        let key = format!("{key_id}:{nonce}:{ts}");
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.retention {
                    true
                } else {
                    entry.insert(now);
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                false
            }
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, seen_at| now.duration_since(*seen_at) < self.retention);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "swept expired nonces");
        }
        removed
    }

    /// Number of remembered nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no nonce is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweep expired entries every `every` on the current runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                store.sweep(Instant::now());
            }
        })
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn seen_before(&self, key_id: &str, nonce: &str, ts: i64) -> Result<bool, StoreError> {
        Ok(self.seen_before_at(key_id, nonce, ts, Instant::now()))
    }
}

/// Replay detection switched off. Every nonce is new.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNonceStore;

#[async_trait]
impl NonceStore for DisabledNonceStore {
    async fn seen_before(&self, _key_id: &str, _nonce: &str, _ts: i64) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Build the nonce store selected by `backend`.
///
/// The memory backend gets a background sweeper, so this must be called from
/// within a Tokio runtime.
#[must_use]
pub fn nonce_store_for(backend: NonceBackend, window: Duration) -> Arc<dyn NonceStore> {
    info!(?backend, window_secs = window.as_secs(), "nonce store selected");
    match backend {
        NonceBackend::Memory => {
            let store = Arc::new(MemoryNonceStore::new(window));
            store.spawn_sweeper(window);
            store
        }
        NonceBackend::Disabled => Arc::new(DisabledNonceStore),
    }
}
