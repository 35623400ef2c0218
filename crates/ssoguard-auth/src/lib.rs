//! Request authentication for the ssoguard SSO gateway.
//!
//! This crate implements the verification side of every credential the SSO
//! service accepts:
//!
//! - Symmetric signed requests: a SHA-256 digest over the request path, body
//!   and a shared secret, sent in a per-namespace header
//!   ([`signature`], [`credentials`]).
//! - Hawk-authenticated machine-to-machine requests with timestamp freshness,
//!   nonce replay protection and signed responses ([`hawk`], [`nonce`]),
//!   gated additionally by an `X-Forwarded-For` allow-list ([`forwarded`]).
//! - Opaque session ids presented as `Authorization: SSO_SESSION_ID <key>`
//!   and resolved against a session store ([`session`], [`users`]).
//! - Open-redirect protection for `next` parameters ([`redirect`]).
//!
//! Every failure a caller can observe is an [`AuthFailure`] carrying one fixed
//! public message per scheme. The precise cause of a rejected credential is
//! logged and never returned.
//!
//! # Usage
//!
//! ```rust
//! use ssoguard_auth::credentials::SignatureRegistry;
//! use ssoguard_auth::signature::generate_signature;
//! use ssoguard_core::{KeyId, Secret};
//!
//! let registry = SignatureRegistry::new()
//!     .register(KeyId::new("ui"), Secret::new("secret"), "X-Signature")
//!     .unwrap();
//!
//! let (parts, ()) = http::Request::builder()
//!     .uri("/path")
//!     .header("X-Signature", generate_signature("secret", "/path", b"body"))
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//!
//! assert!(registry.verify_namespace(&parts, b"body", &KeyId::new("ui")));
//! ```

pub mod credentials;
pub mod error;
pub mod forwarded;
pub mod hawk;
pub mod nonce;
pub mod redirect;
pub mod session;
pub mod signature;
pub mod users;

pub use credentials::SignatureRegistry;
pub use error::{AuthFailure, StoreError};
pub use forwarded::ForwardedForCheck;
pub use hawk::{HawkCredentials, HawkError, HawkReceipt, HawkRequest, HawkSender, HawkVerifier};
pub use nonce::{DisabledNonceStore, MemoryNonceStore, NonceStore, nonce_store_for};
pub use redirect::{RedirectValidator, config_pipeline, is_valid_domain, url_with_redirect};
pub use session::{
    CacheInvalidator, CachedSessionStore, MemorySessionRepository, SessionAuthenticator,
    SessionPrincipal, SessionRecord, SessionStore,
};
pub use signature::{generate_signature, sign_request};
pub use users::{FeedPosition, MemoryUserStore, PageDirection, UserPage, UserStore};
