//! # Taskboard API Server
//!
//! Multi-tenant project boards over HTTP: session-cookie authentication,
//! per-project roles and plans, and an ordered task board with live updates.
//!
//! ## Architecture
//!
//! - PostgreSQL holds users, projects, memberships, tasks and documents
//! - Redis holds sessions and carries board changes between instances
//!   (`PUBLISH board:{project_id}`); each instance relays them into its local
//!   hub, which feeds its SSE subscribers
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskboard-api
//! ```

use anyhow::Context;
use std::sync::Arc;
use taskboard_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskboard_shared::{
    db::{
        migrations::{applied_migrations, run_migrations},
        pool,
    },
    events::{relay::spawn_relay, LocalHub, RedisPublisher},
    notify::LogNotifier,
    redis::{RedisClient, RedisConfig},
    session::RedisSessionStore,
    store::PgStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskboard_api=debug,taskboard_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Taskboard API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let mut db_config = pool::DatabaseConfig::from_url(config.database.url.clone());
    db_config.max_connections = config.database.max_connections;
    db_config.min_connections = db_config.min_connections.min(db_config.max_connections);
    let db = pool::create_pool(db_config)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&db).await.context("Failed to run migrations")?;
    let (applied, latest) = applied_migrations(&db).await?;
    tracing::info!(applied, latest = ?latest, "Database schema ready");

    let redis = RedisClient::new(RedisConfig::from_url(config.redis.url.clone()))
        .await
        .context("Failed to connect to Redis")?;

    let sessions = RedisSessionStore::new(
        redis.clone(),
        format!("{}:", config.session.key_prefix),
        config.session.ttl_secs,
    );

    // Changes go out through Redis only; the relay delivers them back to
    // this instance's hub like any other instance's.
    let hub = LocalHub::default();
    let relay = spawn_relay(redis.clone(), hub.clone());

    let bind_address = config.bind_address();
    let state = AppState::new(
        config,
        Arc::new(PgStore::new(db.clone())),
        Arc::new(sessions),
        Arc::new(RedisPublisher::new(redis.clone())),
        hub,
        Arc::new(LogNotifier),
    )
    .with_backends(db, redis);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    relay.abort();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
