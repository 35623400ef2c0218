//! Activity Streams 2.0 serialization of the user feed.
//!
//! Each user becomes an `Update` activity; a page of users becomes a
//! `Collection` with absolute `next` and `previous` links. Pages are addressed
//! by an opaque `cursor` query parameter naming a position in the
//! `(modified, id)` ordering and a direction to read from it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use ssoguard_auth::{FeedPosition, PageDirection, UserPage};
use ssoguard_core::{User, UserId, create_hash};

use crate::dispatch::HandlerError;

/// Query parameter carrying the page cursor.
pub const CURSOR_PARAM: &str = "cursor";

const APPLICATION: &str = "DirectorySSO";

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// The `dit:DirectorySSO:User` object for a user.
#[must_use]
pub fn user_object(user: &User) -> Value {
    json!({
        "id": format!("dit:{APPLICATION}:User:{}", user.id),
        "type": format!("dit:{APPLICATION}:User"),
        "dit:DirectorySSO:User:hashedUuid": create_hash(user.id),
        "dit:DirectorySSO:User:email": user.email,
        "dit:DirectorySSO:User:telephone": user.telephone,
        "dit:DirectorySSO:User:dateJoined": timestamp(user.date_joined),
        "dit:DirectorySSO:User:LastLogin": user.last_login.map(timestamp),
    })
}

/// The `Update` activity wrapping a user.
#[must_use]
pub fn user_activity(user: &User) -> Value {
    json!({
        "dit:application": APPLICATION,
        "id": format!("dit:{APPLICATION}:User:{}:Update", user.id),
        "published": timestamp(user.modified),
        "type": "Update",
        "object": user_object(user),
    })
}

/// A `Collection` page.
#[must_use]
pub fn users_collection(page: &UserPage, next: Option<String>, previous: Option<String>) -> Value {
    json!({
        "@context": ["https://www.w3.org/ns/activitystreams"],
        "type": "Collection",
        "orderedItems": page.users.iter().map(user_activity).collect::<Vec<_>>(),
        "next": next,
        "previous": previous,
    })
}

/// A position in the feed and the direction to read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// The user the page starts next to, exclusive.
    pub position: FeedPosition,
    /// Read users before `position` rather than after it.
    pub reverse: bool,
}

impl PageCursor {
    /// Cursor for the users after `position`.
    #[must_use]
    pub fn after(position: FeedPosition) -> Self {
        Self {
            position,
            reverse: false,
        }
    }

    /// Cursor for the users before `position`.
    #[must_use]
    pub fn before(position: FeedPosition) -> Self {
        Self {
            position,
            reverse: true,
        }
    }

    /// Direction the store reads in.
    #[must_use]
    pub fn direction(&self) -> PageDirection {
        if self.reverse {
            PageDirection::Backward
        } else {
            PageDirection::Forward
        }
    }

    /// URL-safe token for the `cursor` parameter.
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = form_urlencoded::Serializer::new(String::new())
            .append_pair("r", if self.reverse { "1" } else { "0" })
            .append_pair(
                "m",
                &self
                    .position
                    .modified
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
            )
            .append_pair("i", &self.position.id.to_string())
            .finish();
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Parse a token produced by [`PageCursor::encode`].
    pub fn decode(token: &str) -> Result<Self, HandlerError> {
        let invalid = || HandlerError::InvalidCursor(token.to_owned());
        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;

        let (mut reverse, mut modified, mut id) = (false, None, None);
        for (name, value) in form_urlencoded::parse(&raw) {
            match &*name {
                "r" => reverse = value == "1",
                "m" => {
                    modified = DateTime::parse_from_rfc3339(&value)
                        .ok()
                        .map(|at| at.with_timezone(&Utc));
                }
                "i" => id = value.parse::<i64>().ok().map(UserId::new),
                _ => {}
            }
        }
        match (modified, id) {
            (Some(modified), Some(id)) => Ok(Self {
                position: FeedPosition { modified, id },
                reverse,
            }),
            _ => Err(invalid()),
        }
    }
}

/// Read the page cursor from a query string. Absent means the first page.
pub fn parse_cursor(query: Option<&str>) -> Result<Option<PageCursor>, HandlerError> {
    let Some(query) = query else {
        return Ok(None);
    };
    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == CURSOR_PARAM)
        .map(|(_, value)| PageCursor::decode(&value))
        .transpose()
}

/// `next` and `previous` links for a page read with `cursor`.
///
/// Links point past the page's last user and before its first, so they stay
/// correct when users are modified between requests.
#[must_use]
pub fn page_links(
    base_url: &str,
    cursor: Option<&PageCursor>,
    page: &UserPage,
) -> (Option<String>, Option<String>) {
    let link = |cursor: PageCursor| format!("{base_url}?{CURSOR_PARAM}={}", cursor.encode());
    let reverse = cursor.is_some_and(|c| c.reverse);
    let (has_next, has_previous) = if reverse {
        (true, page.has_more)
    } else {
        (page.has_more, cursor.is_some())
    };

    let next = page
        .users
        .last()
        .filter(|_| has_next)
        .map(|user| link(PageCursor::after(FeedPosition::of(user))));
    let previous = page
        .users
        .first()
        .filter(|_| has_previous)
        .map(|user| link(PageCursor::before(FeedPosition::of(user))));
    (next, previous)
}
