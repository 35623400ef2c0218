//! End-to-end tests for the ssoguard gateway.
//!
//! Each test binds its own gateway on `127.0.0.1:0` over in-memory stores and
//! drives it with `reqwest`, so no external server is needed:
//!
//! ```text
//! cargo test -p ssoguard-integration
//! ```

use std::sync::{Arc, Once};

use chrono::{Duration, TimeZone, Utc};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use ssoguard_auth::{
    CacheInvalidator, CachedSessionStore, HawkCredentials, HawkSender, MemorySessionRepository,
    MemoryUserStore, NonceStore, generate_signature, nonce_store_for,
};
use ssoguard_core::{GuardConfig, Secret, User, UserId};
use ssoguard_http::{GuardHttpConfig, GuardHttpService, StoreHandler};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// `ui` namespace secret the gateway is started with.
pub const SIGNATURE_SECRET: &str = "integration-signature-secret";
/// Activity-stream Hawk key id.
pub const HAWK_ID: &str = "feed-some-id";
/// Activity-stream Hawk key.
pub const HAWK_KEY: &str = "feed-some-secret";
/// Address allowed in `X-Forwarded-For` on activity-stream requests.
pub const ALLOWED_IP: &str = "1.2.3.4";

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A gateway serving on an ephemeral local port.
#[derive(Debug)]
pub struct Gateway {
    /// `http://127.0.0.1:<port>`.
    pub base_url: String,
    /// Session repository behind the gateway's session cache.
    pub sessions: Arc<MemorySessionRepository>,
    /// User store shared by the session authenticator and the activity stream.
    pub users: Arc<MemoryUserStore>,
    /// HTTP client.
    pub client: reqwest::Client,
    server: JoinHandle<()>,
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl Gateway {
    /// Absolute URL for a path and query.
    #[must_use]
    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }

    /// A `GET` signed with the `ui` namespace secret.
    #[must_use]
    pub fn signed_get(&self, path_and_query: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path_and_query)).header(
            "X-Signature",
            generate_signature(SIGNATURE_SECRET, path_and_query, b""),
        )
    }

    /// A Hawk-authenticated `GET` from an allow-listed address, with the
    /// sender needed to verify the reply.
    #[must_use]
    pub fn hawk_get(&self, path_and_query: &str) -> (HawkSender, reqwest::RequestBuilder) {
        let forwarded_for = format!("{ALLOWED_IP}, 10.0.0.1");
        self.hawk_request(path_and_query, HAWK_KEY, &forwarded_for)
    }

    /// A Hawk-authenticated `GET` signed with `key` and carrying
    /// `forwarded_for` as its `X-Forwarded-For` chain.
    #[must_use]
    pub fn hawk_request(
        &self,
        path_and_query: &str,
        key: &str,
        forwarded_for: &str,
    ) -> (HawkSender, reqwest::RequestBuilder) {
        let url = self.url(path_and_query);
        let sender = HawkSender::new(
            HawkCredentials::new(HAWK_ID, Secret::new(key)),
            &url,
            "GET",
            b"",
            "",
        )
        .expect("valid hawk sender");
        let request = self
            .client
            .get(url)
            .header("Authorization", sender.request_header())
            .header("X-Forwarded-For", forwarded_for);
        (sender, request)
    }
}

/// Base configuration for tests.
#[must_use]
pub fn test_config() -> GuardConfig {
    GuardConfig::builder()
        .gateway_listen("127.0.0.1:0".to_owned())
        .signature_secret(SIGNATURE_SECRET.to_owned())
        .activity_stream_access_key_id(HAWK_ID.to_owned())
        .activity_stream_secret_access_key(HAWK_KEY.to_owned())
        .activity_stream_ip_allowlist(vec![ALLOWED_IP.to_owned()])
        .allowed_redirect_domains(vec!["great.gov.uk".to_owned(), "great".to_owned()])
        .session_cookie_secure(false)
        .build()
}

/// A user whose `modified` time is `minutes` after a fixed epoch.
#[must_use]
pub fn test_user(id: i64, minutes: i64) -> User {
    let joined = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date");
    User {
        id: UserId::new(id),
        email: format!("user{id}@example.com"),
        telephone: Some("07700900000".to_owned()),
        date_joined: joined,
        last_login: None,
        modified: joined + Duration::minutes(minutes),
    }
}

/// Start a gateway with the default test configuration and the nonce store
/// it selects.
pub async fn spawn_gateway() -> Gateway {
    let config = test_config();
    let nonces = nonce_store_for(
        config.nonce_backend,
        std::time::Duration::from_secs(config.nonce_expiry_seconds),
    );
    spawn_gateway_with(|_| {}, nonces).await
}

/// Start a gateway with an adjusted configuration and a given nonce store.
pub async fn spawn_gateway_with(
    configure: impl FnOnce(&mut GuardConfig),
    nonces: Arc<dyn NonceStore>,
) -> Gateway {
    init_tracing();

    let mut config = test_config();
    configure(&mut config);

    let users = Arc::new(MemoryUserStore::new());
    let repository = Arc::new(MemorySessionRepository::new());
    let cache = Arc::new(CachedSessionStore::new(repository.clone()));
    repository.subscribe(Arc::new(CacheInvalidator::new(cache.clone())));

    let http_config = GuardHttpConfig::from_config(&config, cache, users.clone(), nonces)
        .expect("valid gateway config");
    let handler = StoreHandler::new(users.clone(), config.activity_stream_page_size);
    let service = GuardHttpService::new(handler, http_config);

    let listener = TcpListener::bind(config.gateway_listen.as_str())
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local address");

    let server = tokio::spawn(async move {
        let http = HttpConnBuilder::new(TokioExecutor::new());
        while let Ok((stream, _)) = listener.accept().await {
            let conn = http
                .serve_connection(TokioIo::new(stream), service.clone())
                .into_owned();
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(error = %e, "connection error");
                }
            });
        }
    });

    Gateway {
        base_url: format!("http://{addr}"),
        sessions: repository,
        users,
        client: reqwest::Client::new(),
        server,
    }
}

mod test_activity_stream;
mod test_redirect;
mod test_session;
mod test_signature;
