//! User lookup collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ssoguard_core::{User, UserId};

use crate::error::StoreError;

/// A user's place in the `(modified, id)` feed ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedPosition {
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Primary key, breaking ties between equal `modified` times.
    pub id: UserId,
}

impl FeedPosition {
    /// The position of `user`.
    #[must_use]
    pub fn of(user: &User) -> Self {
        Self {
            modified: user.modified,
            id: user.id,
        }
    }
}

/// Which way a page is read from its starting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    /// Users strictly after the position (from the start when there is none).
    Forward,
    /// Users strictly before the position (from the end when there is none).
    Backward,
}

/// One page of users in `(modified, id)` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPage {
    /// Users on this page, always in ascending order.
    pub users: Vec<User>,
    /// Whether more users lie beyond this page in the direction it was read.
    pub has_more: bool,
}

/// Read access to user accounts.
#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Look up a user by primary key.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Up to `limit` users next to `from` in `(modified, id)` order.
    ///
    /// Keyset paging: a user modified while a client walks the feed moves
    /// behind the client's position instead of shifting the users after it.
    async fn users_page(
        &self,
        from: Option<FeedPosition>,
        direction: PageDirection,
        limit: usize,
    ) -> Result<UserPage, StoreError>;
}

/// In-memory user store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<UserId, User>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Remove a user.
    pub fn remove(&self, id: UserId) -> Option<User> {
        self.users.remove(&id).map(|(_, user)| user)
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn users_page(
        &self,
        from: Option<FeedPosition>,
        direction: PageDirection,
        limit: usize,
    ) -> Result<UserPage, StoreError> {
        let mut all: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(FeedPosition::of);

        let page = match direction {
            PageDirection::Forward => {
                let start = from.map_or(0, |p| all.partition_point(|u| FeedPosition::of(u) <= p));
                let end = start.saturating_add(limit).min(all.len());
                UserPage {
                    has_more: end < all.len(),
                    users: all.drain(start..end).collect(),
                }
            }
            PageDirection::Backward => {
                let end = from.map_or(all.len(), |p| {
                    all.partition_point(|u| FeedPosition::of(u) < p)
                });
                let start = end.saturating_sub(limit);
                UserPage {
                    has_more: start > 0,
                    users: all.drain(start..end).collect(),
                }
            }
        };
        Ok(page)
    }
}
