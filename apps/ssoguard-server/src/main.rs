//! ssoguard server - the SSO gateway's request-authentication front.
//!
//! This binary hosts `ssoguard-http` over in-memory session, user and nonce
//! stores. It serves the signed session-user and redirect-check endpoints, the
//! Hawk-authenticated activity stream, and a health check for orchestration
//! systems.
//!
//! # Usage
//!
//! ```text
//! SIGNATURE_SECRET=secret GATEWAY_LISTEN=0.0.0.0:8003 ssoguard-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8003` | Bind address |
//! | `SIGNATURE_SECRET` | *(required)* | `ui` namespace signature secret |
//! | `SKIP_SIGNATURE_VALIDATION` | `false` | Skip signature checks |
//! | `SSOGUARD_FIXTURES` | *(unset)* | JSON file of users and sessions to preload |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! The full list lives on [`GuardConfig::from_env`].

mod fixtures;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ssoguard_auth::{
    CacheInvalidator, CachedSessionStore, MemorySessionRepository, MemoryUserStore,
    config_pipeline, nonce_store_for,
};
use ssoguard_core::GuardConfig;
use ssoguard_http::{GuardHandler, GuardHttpConfig, GuardHttpService, StoreHandler};

use crate::fixtures::Fixtures;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often expired sessions are dropped from the in-memory repository.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Load and validate the configuration.
fn load_config() -> Result<GuardConfig> {
    let config = GuardConfig::from_env().context("failed to load configuration")?;
    config_pipeline()
        .run(&config)
        .context("configuration rejected")?;
    Ok(config)
}

/// Build the service over in-memory stores.
///
/// Session lookups go through a read-through cache that the repository keeps
/// consistent by publishing invalidation events.
fn build_service(
    config: &GuardConfig,
    fixtures: Option<Fixtures>,
) -> Result<(GuardHttpService<StoreHandler>, Arc<MemorySessionRepository>)> {
    let users = Arc::new(MemoryUserStore::new());
    let repository = Arc::new(MemorySessionRepository::new());
    if let Some(fixtures) = fixtures {
        fixtures.apply(&users, &repository);
        info!(users = users.len(), "loaded fixtures");
    }

    let sessions = Arc::new(CachedSessionStore::new(repository.clone()));
    repository.subscribe(Arc::new(CacheInvalidator::new(sessions.clone())));

    let nonces = nonce_store_for(
        config.nonce_backend,
        Duration::from_secs(config.nonce_expiry_seconds),
    );
    let http_config = GuardHttpConfig::from_config(config, sessions, users.clone(), nonces)
        .context("failed to build verifiers")?;
    let handler = StoreHandler::new(users, config.activity_stream_page_size);

    Ok((GuardHttpService::new(handler, http_config), repository))
}

/// Periodically drop expired sessions.
fn spawn_session_sweeper(repository: Arc<MemorySessionRepository>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = repository.clear_expired(chrono::Utc::now());
            if removed > 0 {
                debug!(removed, "cleared expired sessions");
            }
        }
    })
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H: GuardHandler>(listener: TcpListener, service: GuardHttpService<H>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Perform a health check by connecting to the gateway and requesting the health endpoint.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request =
        format!("GET /healthcheck/ HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"ok\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let listen = std::env::var("GATEWAY_LISTEN").unwrap_or_else(|_| "0.0.0.0:8003".to_owned());
        let addr = listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = load_config()?;

    init_tracing(&config.log_level)?;

    info!(
        gateway_listen = %config.gateway_listen,
        skip_signature_validation = config.skip_signature_validation,
        rejection_variant = ?config.rejection_variant,
        nonce_backend = ?config.nonce_backend,
        redirect_domains = config.allowed_redirect_domains.len(),
        version = VERSION,
        "starting ssoguard server",
    );
    if config.skip_signature_validation {
        warn!("signature validation is disabled");
    }

    let fixtures = std::env::var_os("SSOGUARD_FIXTURES")
        .map(PathBuf::from)
        .map(|path| Fixtures::load(&path))
        .transpose()?;
    let (service, repository) = build_service(&config, fixtures)?;
    spawn_session_sweeper(repository);

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
