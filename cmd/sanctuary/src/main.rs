//! # Sanctuary Binary
//!
//! Assembles the application from configuration: storage, the moderation
//! judge, token verification, then serves the HTTP API until interrupted.

#[cfg(not(all(feature = "web-axum", feature = "auth-jwt")))]
compile_error!("the sanctuary binary needs the `web-axum` and `auth-jwt` features");

use std::sync::Arc;

use anyhow::Context;
use api_adapters::state::Ports;
use api_adapters::{router, AppState};
use auth_adapters::JwtVerifier;
use configs::{DatabaseSettings, LogFormat, Settings};
use domains::{
    ContentJudge, IdentityVerifier, PostRepository, Profile, ProfileId, ProfileRepository,
    ReactionRepository,
};
use moderation_adapters::HttpContentJudge;
use secrecy::ExposeSecret;
use services::{ModerationPolicy, SystemClock};
use storage_adapters::MemoryStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-postgres")]
use storage_adapters::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(settings.server.log_format);

    // 1. Moderation judge
    let judge = HttpContentJudge::new(
        settings.moderation.endpoint.clone(),
        settings.moderation.timeout(),
    )
    .context("failed to build the moderation client")?;
    info!(endpoint = judge.endpoint(), timeout_ms = settings.moderation.timeout_ms, "moderation judge configured");

    // 2. Token verification
    let identity = JwtVerifier::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        settings.auth.issuer.clone(),
    );

    // 3. Storage, then the services on top of it
    let ports = build_ports(&settings.database, Arc::new(judge), Arc::new(identity)).await?;

    let policy = ModerationPolicy { auto_approve: settings.moderation.auto_approve };
    if policy.auto_approve {
        warn!("auto-approval override enabled: every post is published whatever the judge says");
    }
    let app = router(AppState::new(ports, policy));

    let address = settings.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "sanctuary listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("sanctuary stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn ports_from<S>(
    store: Arc<S>,
    judge: Arc<dyn ContentJudge>,
    identity: Arc<dyn IdentityVerifier>,
) -> Ports
where
    S: PostRepository + ProfileRepository + ReactionRepository + 'static,
{
    Ports {
        posts: store.clone(),
        profiles: store.clone(),
        reactions: store,
        judge,
        identity,
        clock: Arc::new(SystemClock::new()),
    }
}

async fn build_ports(
    database: &DatabaseSettings,
    judge: Arc<dyn ContentJudge>,
    identity: Arc<dyn IdentityVerifier>,
) -> anyhow::Result<Ports> {
    match &database.url {
        #[cfg(feature = "db-postgres")]
        Some(url) => {
            let store = PgStore::connect(url.expose_secret(), database.max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            info!(max_connections = database.max_connections, "using PostgreSQL storage");
            Ok(ports_from(Arc::new(store), judge, identity))
        }
        #[cfg(not(feature = "db-postgres"))]
        Some(_) => anyhow::bail!("database.url is set but this build lacks the `db-postgres` feature"),
        None => {
            let store = MemoryStore::new();
            let members = database.memory_profile_ids();
            for id in &members {
                store.insert_profile(Profile {
                    id: ProfileId::new(id.as_str()),
                    nickname: id.clone(),
                    avatar_url: None,
                });
            }
            warn!(profiles = members.len(), "database.url not set, using in-memory storage");
            Ok(ports_from(Arc::new(store), judge, identity))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
