//! Hawk request authentication for the activity stream.
//!
//! The receiver side ([`HawkVerifier`]) checks, in order: the credentials id
//! (constant time), the request MAC, the payload hash, the timestamp against
//! the freshness window, and finally the nonce against the replay store. Any
//! failure is reported to the caller as the same
//! [`AuthFailure::InvalidCredentials`](crate::AuthFailure) so the response
//! body never tells a client which check it failed. The [`HawkError`] cause is
//! logged.
//!
//! A successful verification yields a [`HawkReceipt`] that signs the response
//! (`Server-Authorization`) so the client can authenticate it in turn with
//! [`HawkSender::accept_response`].

mod header;
mod mac;
mod receiver;
mod sender;

pub use header::{RequestHeader, ResponseHeader};
pub use mac::{MacInput, MacKind, calculate_mac, calculate_payload_hash};
pub use receiver::{HawkCredentials, HawkReceipt, HawkRequest, HawkVerifier};
pub use sender::HawkSender;

use crate::error::StoreError;

/// Internal reason a Hawk exchange failed. Logged, never returned to clients.
#[derive(Debug, thiserror::Error)]
pub enum HawkError {
    /// The header could not be parsed.
    #[error("malformed Hawk header: {0}")]
    MalformedHeader(String),

    /// The credentials id is not the configured one.
    #[error("no Hawk credentials for id {0}")]
    UnknownId(String),

    /// The MAC does not match the recomputed one.
    #[error("MAC mismatch")]
    MacMismatch,

    /// The header carries no payload hash.
    #[error("payload hash missing")]
    MissingHash,

    /// The payload hash does not match the content.
    #[error("mis-computed content hash")]
    MisComputedContentHash,

    /// The timestamp is outside the freshness window.
    #[error("stale timestamp: {skew}s skew exceeds {window}s window")]
    StaleTimestamp {
        /// Absolute difference between the header timestamp and now.
        skew: u64,
        /// Configured window.
        window: u64,
    },

    /// The nonce was already used inside the window.
    #[error("nonce {0} already seen")]
    Replay(String),

    /// The nonce store failed or timed out.
    #[error("nonce store: {0}")]
    NonceStore(#[from] StoreError),

    /// The request URL could not be reconstructed.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}
