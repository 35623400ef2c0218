//! Sender side of the Hawk exchange, as used by activity-stream consumers.

use chrono::Utc;
use subtle::ConstantTimeEq;
use url::{Position, Url};

use super::HawkError;
use super::header::{ResponseHeader, render};
use super::mac::{MacInput, MacKind, calculate_mac, calculate_payload_hash};
use super::receiver::HawkCredentials;

/// A signed outgoing request and the means to check its response.
#[derive(Debug, Clone)]
pub struct HawkSender {
    credentials: HawkCredentials,
    method: String,
    resource: String,
    host: String,
    port: u16,
    ts: i64,
    nonce: String,
    hash: String,
    mac: String,
}

impl HawkSender {
    /// Sign a request made now with a random nonce.
    pub fn new(
        credentials: HawkCredentials,
        url: &str,
        method: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<Self, HawkError> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        Self::at(
            credentials,
            url,
            method,
            content,
            content_type,
            Utc::now().timestamp(),
            &nonce,
        )
    }

    /// Sign a request with an explicit timestamp and nonce.
    pub fn at(
        credentials: HawkCredentials,
        url: &str,
        method: &str,
        content: &[u8],
        content_type: &str,
        ts: i64,
        nonce: &str,
    ) -> Result<Self, HawkError> {
        let url = Url::parse(url).map_err(|e| HawkError::InvalidUrl(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| HawkError::InvalidUrl(format!("no host in {url}")))?
            .to_owned();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HawkError::InvalidUrl(format!("no port for {url}")))?;
        let resource = url[Position::BeforePath..Position::AfterQuery].to_owned();
        let hash = calculate_payload_hash(content, content_type);
        let method = method.to_ascii_uppercase();

        let mac = calculate_mac(
            credentials.key.expose().as_bytes(),
            &MacInput {
                kind: MacKind::Header,
                ts,
                nonce,
                method: &method,
                resource: &resource,
                host: &host,
                port,
                hash: Some(&hash),
                ext: None,
                app: None,
                dlg: None,
            },
        );

        Ok(Self {
            credentials,
            method,
            resource,
            host,
            port,
            ts,
            nonce: nonce.to_owned(),
            hash,
            mac,
        })
    }

    /// The `Authorization` header value.
    #[must_use]
    pub fn request_header(&self) -> String {
        let ts = self.ts.to_string();
        render(&[
            ("id", self.credentials.id.as_str()),
            ("ts", ts.as_str()),
            ("nonce", self.nonce.as_str()),
            ("hash", self.hash.as_str()),
            ("mac", self.mac.as_str()),
        ])
    }

    /// Verify a `Server-Authorization` header against the response content.
    pub fn accept_response(
        &self,
        header: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), HawkError> {
        let header = ResponseHeader::parse(header)?;
        let expected_mac = calculate_mac(
            self.credentials.key.expose().as_bytes(),
            &MacInput {
                kind: MacKind::Response,
                ts: self.ts,
                nonce: &self.nonce,
                method: &self.method,
                resource: &self.resource,
                host: &self.host,
                port: self.port,
                hash: header.hash.as_deref(),
                ext: header.ext.as_deref(),
                app: None,
                dlg: None,
            },
        );
        if !bool::from(expected_mac.as_bytes().ct_eq(header.mac.as_bytes())) {
            return Err(HawkError::MacMismatch);
        }

        let hash = header.hash.as_deref().ok_or(HawkError::MissingHash)?;
        let expected_hash = calculate_payload_hash(content, content_type);
        if !bool::from(expected_hash.as_bytes().ct_eq(hash.as_bytes())) {
            return Err(HawkError::MisComputedContentHash);
        }
        Ok(())
    }
}
