//! Hawk normalized strings, MACs and payload hashes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, KeyInit, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Which side of the exchange a MAC covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacKind {
    /// Request `Authorization` header.
    Header,
    /// Response `Server-Authorization` header.
    Response,
}

impl MacKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Response => "response",
        }
    }
}

/// Inputs to a Hawk MAC.
#[derive(Debug, Clone)]
pub struct MacInput<'a> {
    /// Header or response.
    pub kind: MacKind,
    /// Unix timestamp in seconds.
    pub ts: i64,
    /// Nonce.
    pub nonce: &'a str,
    /// Uppercase request method.
    pub method: &'a str,
    /// Request path plus query string.
    pub resource: &'a str,
    /// Lowercase host name.
    pub host: &'a str,
    /// Port, explicit or the scheme default.
    pub port: u16,
    /// Payload hash or empty.
    pub hash: Option<&'a str>,
    /// Application data or empty.
    pub ext: Option<&'a str>,
    /// Oz application id.
    pub app: Option<&'a str>,
    /// Oz delegating application id.
    pub dlg: Option<&'a str>,
}

impl MacInput<'_> {
    /// The `hawk.1.<kind>` normalized string the MAC is computed over.
    #[must_use]
    pub fn normalized(&self) -> String {
        let ext = self.ext.map(escape_ext).unwrap_or_default();
        let mut normalized = format!(
            "hawk.1.{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            self.kind.as_str(),
            self.ts,
            self.nonce,
            self.method.to_ascii_uppercase(),
            self.resource,
            self.host.to_ascii_lowercase(),
            self.port,
            self.hash.unwrap_or_default(),
            ext,
        );
        if let Some(app) = self.app {
            normalized.push_str(app);
            normalized.push('\n');
            normalized.push_str(self.dlg.unwrap_or_default());
            normalized.push('\n');
        }
        normalized
    }
}

fn escape_ext(ext: &str) -> String {
    ext.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Base64 HMAC-SHA256 over the normalized string.
#[must_use]
pub fn calculate_mac(key: &[u8], input: &MacInput<'_>) -> String {
    let normalized = input.normalized();
    debug!(normalized = %normalized.escape_debug(), "hawk normalized string");
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(normalized.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Base64 SHA-256 payload hash.
///
/// The content type is lowercased and stripped of parameters (`; charset=..`)
/// before hashing.
#[must_use]
pub fn calculate_payload_hash(content: &[u8], content_type: &str) -> String {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(b"hawk.1.payload\n");
    hasher.update(content_type.as_bytes());
    hasher.update(b"\n");
    hasher.update(content);
    hasher.update(b"\n");
    BASE64.encode(hasher.finalize())
}
