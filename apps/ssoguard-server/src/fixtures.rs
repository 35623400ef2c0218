//! Seed data for the in-memory stores.
//!
//! `SSOGUARD_FIXTURES` may point at a JSON file of users and sessions to load
//! at startup:
//!
//! ```json
//! {
//!   "users": [{"id": 1, "email": "jim@example.com", "telephone": null,
//!              "date_joined": "2024-01-01T00:00:00Z", "last_login": null,
//!              "modified": "2024-01-01T00:00:00Z"}],
//!   "sessions": [{"session_key": "abc", "user_id": 1, "ttl_seconds": 3600}]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use ssoguard_auth::{MemorySessionRepository, MemoryUserStore, SessionRecord};
use ssoguard_core::{User, UserId};

/// Users and sessions to preload.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    /// User accounts.
    pub users: Vec<User>,
    /// Live sessions.
    pub sessions: Vec<SessionFixture>,
}

/// A session to preload.
#[derive(Debug, Deserialize)]
pub struct SessionFixture {
    /// Session key clients present as `SSO_SESSION_ID <key>`.
    pub session_key: String,
    /// Owner of the session.
    pub user_id: UserId,
    /// Lifetime from startup.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,
}

fn default_ttl_seconds() -> i64 {
    1_209_600
}

impl Fixtures {
    /// Read fixtures from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read fixtures from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid fixtures in {}", path.display()))
    }

    /// Insert every fixture into the stores.
    pub fn apply(self, users: &MemoryUserStore, sessions: &MemorySessionRepository) {
        let now = Utc::now();
        for user in self.users {
            users.insert(user);
        }
        for session in self.sessions {
            sessions.insert(SessionRecord::for_user(
                session.session_key,
                session.user_id,
                now + Duration::seconds(session.ttl_seconds),
            ));
        }
    }
}
