//! Open-redirect protection.
//!
//! A redirect target is allowed when it is an internal path, when its
//! registrable domain (`<domain>.<suffix>`) is allow-listed, or when its public
//! suffix alone is allow-listed. Suffixes come from the public suffix list
//! plus the local `great` suffix. Hosts whose suffix is not on the list have
//! an empty suffix, so `localhost` and bare IP addresses never match.

use std::collections::HashSet;

use ssoguard_core::{GuardConfig, GuardError, GuardResult, ValidationPipeline};
use tracing::{debug, info};
use url::{Host, Url};

/// Suffix used by local development hosts, absent from the public list.
pub const EXTRA_SUFFIX: &str = "great";

/// A host split into its public-suffix-aware parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Labels left of the registrable domain (`mail` in `mail.google.com`).
    pub subdomain: String,
    /// The label directly left of the suffix (`google`).
    pub domain: String,
    /// Public suffix (`com`, `co.uk`, `great`), empty when unknown.
    pub suffix: String,
    /// Whether the input carried a `scheme://` prefix.
    pub has_scheme: bool,
    /// Whether anything follows the authority (path, query or fragment).
    pub has_path_or_query: bool,
}

impl Extracted {
    /// `<domain>.<suffix>`, if both parts are present.
    #[must_use]
    pub fn registrable(&self) -> Option<String> {
        (!self.domain.is_empty() && !self.suffix.is_empty())
            .then(|| format!("{}.{}", self.domain, self.suffix))
    }
}

/// Split a URL, scheme-relative URL or bare host into subdomain, domain and
/// suffix. Returns `None` when there is no domain-name host.
#[must_use]
pub fn extract(candidate: &str) -> Option<Extracted> {
    let trimmed = candidate.trim();
    let (has_scheme, after_scheme) = match trimmed.split_once("://") {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            (true, rest)
        }
        _ => (false, trimmed.strip_prefix("//").unwrap_or(trimmed)),
    };
    let authority_end = after_scheme
        .find(['/', '?', '#'])
        .unwrap_or(after_scheme.len());
    let authority = after_scheme[..authority_end].trim_start_matches('.');
    if authority.is_empty() {
        return None;
    }

    let url = Url::parse(&format!("http://{authority}")).ok()?;
    let host = match url.host()? {
        Host::Domain(domain) => domain.trim_end_matches('.').to_ascii_lowercase(),
        Host::Ipv4(_) | Host::Ipv6(_) => return None,
    };
    let suffix = public_suffix(&host);
    let rest = if suffix.is_empty() {
        host.as_str()
    } else {
        host.strip_suffix(suffix)
            .map_or("", |r| r.trim_end_matches('.'))
    };
    let (subdomain, domain) = rest.rsplit_once('.').unwrap_or(("", rest));

    Some(Extracted {
        subdomain: subdomain.to_owned(),
        domain: domain.to_owned(),
        suffix: suffix.to_owned(),
        has_scheme,
        has_path_or_query: authority_end < after_scheme.len(),
    })
}

fn public_suffix(host: &str) -> &str {
    if host == EXTRA_SUFFIX || host.ends_with(".great") {
        return &host[host.len() - EXTRA_SUFFIX.len()..];
    }
    match psl::suffix(host.as_bytes()) {
        Some(suffix) if suffix.is_known() => {
            let len = suffix.as_bytes().len();
            &host[host.len() - len..]
        }
        _ => "",
    }
}

/// Whether `entry` may appear in the allowed redirect domains.
///
/// Accepts an apex domain (`great.gov.uk`, optionally with a scheme) with no
/// subdomain and no path or query, or a bare suffix (`com`, `.com`) without a
/// scheme.
#[must_use]
pub fn is_valid_domain(entry: &str) -> bool {
    let Some(parts) = extract(entry) else {
        return false;
    };
    let is_domain = !parts.domain.is_empty() && !parts.suffix.is_empty();
    let is_suffix = !parts.suffix.is_empty() && parts.domain.is_empty() && parts.subdomain.is_empty();

    if is_domain && parts.subdomain.is_empty() {
        !parts.has_path_or_query
    } else {
        is_suffix && !parts.has_scheme && !parts.has_path_or_query
    }
}

/// Append a redirect parameter to `url`. An empty `next` leaves `url` as is.
///
/// ```
/// use ssoguard_auth::redirect::url_with_redirect;
///
/// assert_eq!(
///     url_with_redirect("/accounts/login/", "http://example.com/a b", "next"),
///     "/accounts/login/?next=http%3A%2F%2Fexample.com%2Fa+b"
/// );
/// ```
#[must_use]
pub fn url_with_redirect(url: &str, next: &str, field_name: &str) -> String {
    if next.is_empty() {
        return url.to_owned();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(field_name, next)
        .finish();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

/// Checks `next` redirect targets against the allowed domains.
#[derive(Debug, Clone)]
pub struct RedirectValidator {
    allowed: HashSet<String>,
    field_name: String,
}

impl RedirectValidator {
    /// Build a validator over `entries`.
    ///
    /// Entries are normalized to `domain.suffix` or `suffix` form.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidRedirectDomain`] for an entry rejected by
    /// [`is_valid_domain`].
    pub fn new<I, S>(entries: I) -> GuardResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = HashSet::new();
        for entry in entries {
            let entry = entry.as_ref();
            let normalized = is_valid_domain(entry)
                .then(|| extract(entry))
                .flatten()
                .and_then(|parts| parts.registrable().or(Some(parts.suffix)))
                .ok_or_else(|| GuardError::InvalidRedirectDomain(entry.to_owned()))?;
            allowed.insert(normalized);
        }
        info!(domains = allowed.len(), "redirect allow-list loaded");
        Ok(Self {
            allowed,
            field_name: "next".to_owned(),
        })
    }

    /// Build the validator from configuration.
    pub fn from_config(config: &GuardConfig) -> GuardResult<Self> {
        Ok(Self::new(&config.allowed_redirect_domains)?
            .with_field_name(config.redirect_field_name.clone()))
    }

    /// Set the query parameter carrying the redirect target.
    #[must_use]
    pub fn with_field_name(mut self, field_name: String) -> Self {
        self.field_name = field_name;
        self
    }

    /// The query parameter carrying the redirect target.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The redirect target in a query string, if present.
    #[must_use]
    pub fn target(&self, query: Option<&str>) -> Option<String> {
        form_urlencoded::parse(query?.as_bytes())
            .find(|(name, _)| name == self.field_name.as_str())
            .map(|(_, value)| value.into_owned())
    }

    /// Whether redirecting to `candidate` is safe.
    ///
    /// Targets containing control characters are refused: browsers drop tab
    /// and newline from URLs, which turns `/\t/host` into `//host`.
    #[must_use]
    pub fn is_valid_redirect(&self, candidate: &str) -> bool {
        if candidate.chars().any(|c| c.is_ascii_control()) {
            debug!(candidate, "redirect target contains control characters");
            return false;
        }
        if candidate.starts_with('/') && !candidate.starts_with("//") && !candidate.starts_with("/\\")
        {
            return true;
        }
        let Some(parts) = extract(candidate) else {
            debug!(candidate, "redirect target has no domain");
            return false;
        };

        let apex_allowed = parts.subdomain.is_empty()
            && parts
                .registrable()
                .is_some_and(|domain| self.allowed.contains(&domain));
        let suffix_allowed = !parts.suffix.is_empty()
            && !parts.has_path_or_query
            && self.allowed.contains(&parts.suffix);

        let valid = apex_allowed || suffix_allowed;
        if !valid {
            debug!(candidate, "redirect target not allowed");
        }
        valid
    }
}

/// The full configuration pipeline: core checks plus redirect domains.
#[must_use]
pub fn config_pipeline() -> ValidationPipeline<GuardConfig> {
    GuardConfig::base_pipeline().with("allowed_redirect_domains", |config: &GuardConfig| {
        match config
            .allowed_redirect_domains
            .iter()
            .find(|entry| !is_valid_domain(entry))
        {
            Some(entry) => Err(GuardError::InvalidRedirectDomain(entry.clone())),
            None => Ok(()),
        }
    })
}
