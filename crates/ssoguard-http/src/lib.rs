//! HTTP surface of the ssoguard SSO gateway.
//!
//! This crate hosts the verifiers from `ssoguard-auth` behind a hyper service:
//!
//! - **Routing** ([`router`]): exact-path resolution of the gateway endpoints.
//!
//! - **Dispatch** ([`dispatch`]): hands authenticated requests to the business
//!   logic via the [`GuardHandler`](dispatch::GuardHandler) trait.
//!
//! - **Activity stream** ([`activity`]): Activity Streams 2.0 serialization of
//!   the user feed, with cursor pagination.
//!
//! - **Service** ([`service`]): the [`GuardHttpService`](service::GuardHttpService)
//!   that implements hyper's `Service` trait, running signature rejection,
//!   session and Hawk authentication, and the logged-in cookie.
//!
//! - **Body** ([`body`]): the [`GuardResponseBody`](body::GuardResponseBody) type.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> GuardHttpService (hyper Service)
//!     -> Health check interception
//!     -> Body collection
//!     -> Signature rejection (401 Unauthorized / 400 PFO)
//!     -> Route resolution
//!     -> SSO_SESSION_ID | Hawk + X-Forwarded-For
//!     -> GuardHandler
//!     -> Common response headers, sso_display_logged_in cookie
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ssoguard_auth::{DisabledNonceStore, MemorySessionRepository, MemoryUserStore};
//! use ssoguard_core::GuardConfig;
//! use ssoguard_http::{GuardHttpConfig, GuardHttpService, StoreHandler};
//!
//! let config = GuardConfig::builder()
//!     .signature_secret("secret".to_owned())
//!     .build();
//! let users = Arc::new(MemoryUserStore::new());
//! let http_config = GuardHttpConfig::from_config(
//!     &config,
//!     Arc::new(MemorySessionRepository::new()),
//!     users.clone(),
//!     Arc::new(DisabledNonceStore),
//! )
//! .unwrap();
//! let service = GuardHttpService::new(StoreHandler::new(users, 2), http_config);
//! // Use `service` with hyper server.
//! ```

pub mod activity;
pub mod body;
pub mod dispatch;
pub mod router;
pub mod service;

// Re-export key types for convenience.
pub use body::GuardResponseBody;
pub use dispatch::{GuardHandler, HandlerError, PageRequest, StoreHandler};
pub use router::{Resolution, Route};
pub use service::{GuardHttpConfig, GuardHttpService, LoggedInCookie};
