//! Small shared helpers.

use sha2::{Digest, Sha256};

/// Produce the 64 character hex SHA-256 of an identifier's decimal form.
///
/// Used to publish a stable, non-reversible user reference in the activity
/// stream instead of the raw primary key.
///
/// # Examples
///
/// ```
/// use ssoguard_core::create_hash;
///
/// assert_eq!(create_hash(1).len(), 64);
/// ```
#[must_use]
pub fn create_hash(id: impl std::fmt::Display) -> String {
    hex::encode(Sha256::digest(id.to_string().as_bytes()))
}
