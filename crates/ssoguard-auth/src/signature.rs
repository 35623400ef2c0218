//! Symmetric request signatures.
//!
//! A signature is the lowercase hex SHA-256 of:
//!
//! ```text
//! UTF-8(full path incl. query) || body bytes || UTF-8(secret)
//! ```
//!
//! The body is hashed exactly as received; nothing is re-encoded. Signatures do
//! not expire: the same request always produces the same signature.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Compute the signature for a request.
///
/// # Examples
///
/// ```
/// use ssoguard_auth::signature::generate_signature;
///
/// assert_eq!(
///     generate_signature("secret", "path", b"body"),
///     "c6be1984f8b516e94d7257031cc47ed9863a433e461ac0117214b1b6a7801991"
/// );
/// ```
#[must_use]
pub fn generate_signature(secret: &str, path: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(body);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// The request path including its query string, as it was signed.
#[must_use]
pub fn full_path(parts: &http::request::Parts) -> &str {
    parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), http::uri::PathAndQuery::as_str)
}

/// Add a signature header to a request under construction.
///
/// The builder's URI must already be set; the signature covers its path and
/// query.
#[must_use]
pub fn sign_request(
    builder: http::request::Builder,
    secret: &str,
    header: &str,
    body: &[u8],
) -> http::request::Builder {
    let path = builder
        .uri_ref()
        .and_then(http::Uri::path_and_query)
        .map_or("/", http::uri::PathAndQuery::as_str)
        .to_owned();
    builder.header(header, generate_signature(secret, &path, body))
}

/// Check a declared signature against the one recomputed for `secret`.
///
/// The comparison is constant-time in the length of the expected signature.
#[must_use]
pub fn signature_matches(secret: &str, path: &str, body: &[u8], provided: &str) -> bool {
    let expected = generate_signature(secret, path, body);
    let matched: bool = expected.as_bytes().ct_eq(provided.as_bytes()).into();
    if !matched {
        debug!(path, "signature mismatch");
    }
    matched
}
