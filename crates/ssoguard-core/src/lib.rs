//! Core types, configuration, and validation for ssoguard.
//!
//! This crate provides the building blocks shared by the authentication and
//! HTTP crates: the process-wide [`GuardConfig`], the startup error type, the
//! key-id/secret/user domain types, and the [`ValidationPipeline`] used to
//! reject bad configuration before the server accepts its first request.

mod config;
mod error;
mod helpers;
mod types;
mod validation;

pub use config::{GuardConfig, NonceBackend, RejectionVariant};
pub use error::{GuardError, GuardResult};
pub use helpers::create_hash;
pub use types::{KeyId, Secret, User, UserId};
pub use validation::ValidationPipeline;
