use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfarer_api::{app, auth, AppState};
use wayfarer_booking::MockPaymentAdapter;
use wayfarer_store::{Config, DbClient, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfarer_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Wayfarer API on port {}", config.server.port);

    let payments = Arc::new(MockPaymentAdapter::new(config.payment.checkout_base_url.clone()));

    let mut state = if config.database.is_configured() {
        let db = DbClient::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to Postgres")?;
        db.migrate().await.context("Failed to run migrations")?;
        AppState::postgres(&config, &db, payments)
    } else {
        tracing::warn!("No database configured, using the in-memory store");
        AppState::in_memory(&config, payments)
    };

    if !config.redis.url.trim().is_empty() {
        let redis = RedisClient::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?;
        state = state.with_redis(Arc::new(redis));
    }

    auth::bootstrap_admin(&state, &config.auth.bootstrap_admin_email)
        .await
        .context("Failed to seed the bootstrap admin")?;

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
