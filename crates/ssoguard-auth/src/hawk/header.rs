//! Parsing of `Hawk` authorization headers.
//!
//! ```text
//! Hawk id="dh37fgj492je", ts="1353832234", nonce="j4h3g2", hash="...", ext="...", mac="..."
//! ```
//!
//! Attribute values are restricted to printable ASCII without `"` and `\`.
//! Unknown attributes and repeated attributes are rejected.

use std::collections::BTreeMap;

use super::HawkError;

const SCHEME: &str = "Hawk";

const REQUEST_ATTRIBUTES: &[&str] = &["id", "ts", "nonce", "hash", "ext", "mac", "app", "dlg"];
const RESPONSE_ATTRIBUTES: &[&str] = &["mac", "hash", "ext"];

/// Parsed request `Authorization: Hawk ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    /// Credentials id.
    pub id: String,
    /// Unix timestamp (seconds) the client claims the request was made at.
    pub ts: i64,
    /// Client-chosen nonce.
    pub nonce: String,
    /// Payload hash, if the client sent one.
    pub hash: Option<String>,
    /// Application-specific data.
    pub ext: Option<String>,
    /// Request MAC.
    pub mac: String,
    /// Application id (Oz).
    pub app: Option<String>,
    /// Delegated-by application id (Oz).
    pub dlg: Option<String>,
}

impl RequestHeader {
    /// Parse a request header value.
    pub fn parse(value: &str) -> Result<Self, HawkError> {
        let mut attrs = parse_attributes(value, REQUEST_ATTRIBUTES)?;
        let ts = required(&mut attrs, "ts")?;
        Ok(Self {
            id: required(&mut attrs, "id")?,
            ts: ts
                .parse()
                .map_err(|_| HawkError::MalformedHeader(format!("invalid ts: {ts}")))?,
            nonce: required(&mut attrs, "nonce")?,
            mac: required(&mut attrs, "mac")?,
            hash: attrs.remove("hash"),
            ext: attrs.remove("ext"),
            app: attrs.remove("app"),
            dlg: attrs.remove("dlg"),
        })
    }
}

/// Parsed `Server-Authorization: Hawk ...` response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Response MAC.
    pub mac: String,
    /// Response payload hash.
    pub hash: Option<String>,
    /// Application-specific data.
    pub ext: Option<String>,
}

impl ResponseHeader {
    /// Parse a response header value.
    pub fn parse(value: &str) -> Result<Self, HawkError> {
        let mut attrs = parse_attributes(value, RESPONSE_ATTRIBUTES)?;
        Ok(Self {
            mac: required(&mut attrs, "mac")?,
            hash: attrs.remove("hash"),
            ext: attrs.remove("ext"),
        })
    }
}

/// Render attributes as a `Hawk` header value.
pub(crate) fn render(attrs: &[(&str, &str)]) -> String {
    let joined = attrs
        .iter()
        .map(|(name, value)| format!("{name}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{SCHEME} {joined}")
}

fn required(attrs: &mut BTreeMap<String, String>, name: &str) -> Result<String, HawkError> {
    attrs
        .remove(name)
        .ok_or_else(|| HawkError::MalformedHeader(format!("missing attribute: {name}")))
}

fn is_value_char(c: char) -> bool {
    (c == ' ' || c.is_ascii_graphic()) && c != '"' && c != '\\'
}

fn parse_attributes(
    value: &str,
    allowed: &[&str],
) -> Result<BTreeMap<String, String>, HawkError> {
    let value = value.trim();
    let rest = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(SCHEME) => rest,
        _ => return Err(HawkError::MalformedHeader("not a Hawk header".to_owned())),
    };

    let mut attrs = BTreeMap::new();
    let mut rest = rest.trim_start();
    while !rest.is_empty() {
        let (name, after_name) = rest
            .split_once('=')
            .ok_or_else(|| HawkError::MalformedHeader("expected '='".to_owned()))?;
        let name = name.trim();
        if !allowed.contains(&name) {
            return Err(HawkError::MalformedHeader(format!("unknown attribute: {name}")));
        }
        let quoted = after_name
            .strip_prefix('"')
            .ok_or_else(|| HawkError::MalformedHeader(format!("unquoted value for {name}")))?;
        let end = quoted
            .find('"')
            .ok_or_else(|| HawkError::MalformedHeader(format!("unterminated value for {name}")))?;
        let attr_value = &quoted[..end];
        if !attr_value.chars().all(is_value_char) {
            return Err(HawkError::MalformedHeader(format!("bad characters in {name}")));
        }
        if attrs.insert(name.to_owned(), attr_value.to_owned()).is_some() {
            return Err(HawkError::MalformedHeader(format!("duplicate attribute: {name}")));
        }

        rest = quoted[end + 1..].trim_start();
        if let Some(next) = rest.strip_prefix(',') {
            rest = next.trim_start();
        } else if !rest.is_empty() {
            return Err(HawkError::MalformedHeader("expected ','".to_owned()));
        }
    }
    Ok(attrs)
}
