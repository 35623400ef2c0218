//! Error types for the ssoguard core.
//!
//! Everything here is a startup failure. Per-request authentication failures
//! live in `ssoguard-auth` and never surface as a [`GuardError`].

/// Core error type for ssoguard infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A secret was registered without a usable header name.
    #[error("invalid header binding for key id {key_id}: {header}")]
    InvalidHeaderBinding {
        /// The namespace the secret was registered under.
        key_id: String,
        /// The offending header name.
        header: String,
    },

    /// A secret value is empty.
    #[error("empty secret for key id {0}")]
    EmptySecret(String),

    /// An allowed redirect domain is not an apex domain or a bare suffix.
    #[error("invalid allowed redirect domain: {0}")]
    InvalidRedirectDomain(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for ssoguard startup operations.
pub type GuardResult<T> = Result<T, GuardError>;
