//! Secret registry for symmetric request signatures.
//!
//! Each secret is registered under a namespace ([`KeyId`]) and bound to the
//! header its signature travels in. The binding is looked up by secret, so a
//! caller that only knows which secret applies can verify a request without
//! knowing the header name. The registry is built once at startup and never
//! mutated afterwards.

use std::collections::{BTreeMap, HashMap};

use http::HeaderName;
use ssoguard_core::{GuardConfig, GuardError, GuardResult, KeyId, Secret};
use tracing::debug;

use crate::signature::{full_path, generate_signature, signature_matches};

#[derive(Debug, Clone)]
struct Binding {
    secret: Secret,
    header: HeaderName,
}

/// Registry of `{namespace -> (secret, header)}` with a reverse
/// `{secret -> header}` index.
///
/// # Examples
///
/// ```
/// use ssoguard_auth::credentials::SignatureRegistry;
/// use ssoguard_core::{KeyId, Secret};
///
/// let registry = SignatureRegistry::new()
///     .register(KeyId::new("proxy"), Secret::new("p"), "X-Proxy-Signature")
///     .unwrap();
/// assert_eq!(
///     registry.header_for(&Secret::new("p")).map(|h| h.as_str()),
///     Some("x-proxy-signature")
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    bindings: BTreeMap<KeyId, Binding>,
    headers: HashMap<Secret, HeaderName>,
}

impl SignatureRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `secret` under `key_id`, bound to `header`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::EmptySecret`] for an empty secret,
    /// [`GuardError::InvalidHeaderBinding`] for an invalid header name, and
    /// [`GuardError::Config`] when the namespace or secret is already
    /// registered.
    pub fn register(mut self, key_id: KeyId, secret: Secret, header: &str) -> GuardResult<Self> {
        if secret.is_empty() {
            return Err(GuardError::EmptySecret(key_id.to_string()));
        }
        let header_name =
            HeaderName::from_bytes(header.as_bytes()).map_err(|_| GuardError::InvalidHeaderBinding {
                key_id: key_id.to_string(),
                header: header.to_owned(),
            })?;
        if self.bindings.contains_key(&key_id) {
            return Err(GuardError::Config(format!(
                "signature namespace registered twice: {key_id}"
            )));
        }
        if self.headers.contains_key(&secret) {
            return Err(GuardError::Config(format!(
                "secret for {key_id} is shared with another namespace"
            )));
        }

        debug!(key_id = %key_id, header = %header_name, "registered signature secret");
        self.headers.insert(secret.clone(), header_name.clone());
        self.bindings.insert(
            key_id,
            Binding {
                secret,
                header: header_name,
            },
        );
        Ok(self)
    }

    /// Build the registry from the process configuration.
    ///
    /// Registers the `ui` namespace from `SIGNATURE_SECRET` and, when set, the
    /// `proxy` namespace from `PROXY_SIGNATURE_SECRET`. With signature
    /// validation skipped and no secret configured the registry is empty.
    pub fn from_config(config: &GuardConfig) -> GuardResult<Self> {
        let mut registry = Self::new();
        if !(config.skip_signature_validation && config.signature_secret.is_empty()) {
            registry = registry.register(
                KeyId::new(KeyId::UI),
                Secret::new(config.signature_secret.clone()),
                &config.signature_header,
            )?;
        }
        if let Some(proxy) = &config.proxy_signature_secret {
            registry = registry.register(
                KeyId::new(KeyId::PROXY),
                Secret::new(proxy.clone()),
                &config.proxy_signature_header,
            )?;
        }
        Ok(registry)
    }

    /// The secret registered under `key_id`.
    #[must_use]
    pub fn secret(&self, key_id: &KeyId) -> Option<&Secret> {
        self.bindings.get(key_id).map(|b| &b.secret)
    }

    /// The header name bound to `secret`.
    #[must_use]
    pub fn header_for(&self, secret: &Secret) -> Option<&HeaderName> {
        self.headers.get(secret)
    }

    /// Registered namespaces.
    pub fn key_ids(&self) -> impl Iterator<Item = &KeyId> {
        self.bindings.keys()
    }

    /// Whether no secret is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Verify that the request carries a valid signature for `secret`.
    ///
    /// Returns `false`, never an error, when the secret has no header
    /// binding, the header is absent or not valid UTF-8, or the signature
    /// does not match.
    #[must_use]
    pub fn verify(&self, parts: &http::request::Parts, body: &[u8], secret: &Secret) -> bool {
        let Some(header) = self.header_for(secret) else {
            debug!("no header bound to secret");
            return false;
        };
        let Some(provided) = parts.headers.get(header).and_then(|v| v.to_str().ok()) else {
            debug!(header = %header, "signature header missing");
            return false;
        };
        signature_matches(secret.expose(), full_path(parts), body, provided)
    }

    /// Verify the request against the secret registered under `key_id`.
    #[must_use]
    pub fn verify_namespace(&self, parts: &http::request::Parts, body: &[u8], key_id: &KeyId) -> bool {
        self.secret(key_id)
            .is_some_and(|secret| self.verify(parts, body, secret))
    }

    /// Header name and value a client sends to sign `path` + `body` for `key_id`.
    #[must_use]
    pub fn sign(&self, key_id: &KeyId, path: &str, body: &[u8]) -> Option<(HeaderName, String)> {
        self.bindings.get(key_id).map(|b| {
            (
                b.header.clone(),
                generate_signature(b.secret.expose(), path, body),
            )
        })
    }
}
