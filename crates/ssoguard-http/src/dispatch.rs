//! Dispatch of authenticated requests to the business handler.
//!
//! The service authenticates a request before anything here runs. A
//! [`GuardHandler`] only turns an authenticated request into a JSON payload.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};
use ssoguard_auth::{PageDirection, SessionPrincipal, StoreError, UserStore};
use ssoguard_core::create_hash;

use crate::activity::{PageCursor, page_links, users_collection};

/// Boxed future returned by [`GuardHandler`] methods.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// Failure inside a handler, after authentication succeeded.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A backing store failed or timed out.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The `cursor` parameter is not a token this service issued.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

impl HandlerError {
    /// HTTP status code for the failure.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::Store(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidCursor(_) => http::StatusCode::NOT_FOUND,
        }
    }

    /// `detail` message for the response body.
    #[must_use]
    pub fn detail(&self) -> &'static str {
        match self {
            Self::Store(_) => "A server error occurred.",
            Self::InvalidCursor(_) => "Invalid cursor",
        }
    }
}

/// A page of the user activity stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Where to read from. `None` is the start of the feed.
    pub cursor: Option<PageCursor>,
    /// Absolute URL of the endpoint, without query, for `next`/`previous`.
    pub base_url: String,
}

/// Trait the business logic provider implements.
///
/// Used as `Arc<H>` behind the service, so methods return boxed futures.
pub trait GuardHandler: Send + Sync + 'static {
    /// Payload for `GET /api/v1/session-user/`.
    fn session_user(&self, principal: SessionPrincipal) -> HandlerFuture {
        Box::pin(async move {
            Ok(json!({
                "id": principal.user.id,
                "email": principal.user.email,
                "hashed_uuid": create_hash(principal.user.id),
            }))
        })
    }

    /// Payload for `GET /activity-stream/`.
    fn activity_stream(&self) -> HandlerFuture {
        Box::pin(async { Ok(json!({ "secret": "content-for-pen-test" })) })
    }

    /// Payload for `GET /activity-stream/users/`.
    fn activity_stream_users(&self, page: PageRequest) -> HandlerFuture;
}

/// Handler backed by a [`UserStore`].
#[derive(Debug, Clone)]
pub struct StoreHandler {
    users: Arc<dyn UserStore>,
    page_size: usize,
}

impl StoreHandler {
    /// Create a handler serving `page_size` users per activity-stream page.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, page_size: usize) -> Self {
        Self {
            users,
            page_size: page_size.max(1),
        }
    }
}

impl GuardHandler for StoreHandler {
    fn activity_stream_users(&self, page: PageRequest) -> HandlerFuture {
        let users = Arc::clone(&self.users);
        let page_size = self.page_size;
        Box::pin(async move {
            let from = page.cursor.map(|c| c.position);
            let direction = page.cursor.map_or(PageDirection::Forward, |c| c.direction());
            tracing::debug!(?from, ?direction, page_size, "serving user activity page");
            let users_page = users.users_page(from, direction, page_size).await?;
            let (next, previous) = page_links(&page.base_url, page.cursor.as_ref(), &users_page);
            Ok(users_collection(&users_page, next, previous))
        })
    }
}
