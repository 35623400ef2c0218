//! `X-Forwarded-For` allow-list check for the activity stream.

use std::collections::HashSet;

use ssoguard_core::GuardConfig;
use tracing::warn;

use crate::error::{AuthFailure, PUBLIC_NETWORK_DENIED_MESSAGE};

/// Passes a request iff at least one address in its `X-Forwarded-For` chain
/// is allow-listed.
#[derive(Debug, Clone)]
pub struct ForwardedForCheck {
    allowed: HashSet<String>,
    enabled: bool,
}

impl ForwardedForCheck {
    /// Create an enabled check over the given addresses.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|ip| ip.as_ref().trim().to_owned())
                .filter(|ip| !ip.is_empty())
                .collect(),
            enabled: true,
        }
    }

    /// A check that passes every request.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            allowed: HashSet::new(),
            enabled: false,
        }
    }

    /// Build the check from configuration.
    #[must_use]
    pub fn from_config(config: &GuardConfig) -> Self {
        if config.activity_stream_ip_check {
            Self::new(&config.activity_stream_ip_allowlist)
        } else {
            Self::disabled()
        }
    }

    /// Whether the check runs at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check an `X-Forwarded-For` header value.
    pub fn check(&self, forwarded_for: Option<&str>) -> Result<(), AuthFailure> {
        if !self.enabled {
            return Ok(());
        }
        let Some(chain) = forwarded_for else {
            warn!("denied: no X-Forwarded-For header");
            return Err(AuthFailure::Forbidden(PUBLIC_NETWORK_DENIED_MESSAGE));
        };
        if chain.split(',').map(str::trim).any(|ip| self.allowed.contains(ip)) {
            Ok(())
        } else {
            warn!(x_forwarded_for = chain, "denied: no allow-listed address");
            Err(AuthFailure::Forbidden(PUBLIC_NETWORK_DENIED_MESSAGE))
        }
    }
}
