//! Auth service entry point

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use auth_service::config::Settings;
use auth_service::db::{PgAccountDirectory, PgServiceClientRepository};
use auth_service::services::{
    provision_clients, AuthService, ClientCredentialsIssuer, RefreshTokenStore,
};
use auth_service::{routes, AppState};
use jwt_security::{
    KeyProvider, RedisTtlStore, SharedClock, SystemClock, TokenBlacklist, TokenCodec, TokenIssuer,
};
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let settings = Settings::load().context("Failed to load configuration")?;
    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "Starting auth service"
    );

    let clock: SharedClock = Arc::new(SystemClock);
    let keys = Arc::new(KeyProvider::from_settings(&settings.jwt)?);
    tracing::info!(scheme = keys.scheme().name(), "JWT keys initialized");

    let codec = Arc::new(TokenCodec::new(keys, settings.jwt.issuer.clone(), clock.clone()));
    let issuer = Arc::new(TokenIssuer::from_settings(codec.clone(), &settings.jwt)?);

    let redis_client =
        redis::Client::open(settings.redis.url.as_str()).context("Invalid REDIS_URL")?;
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;
    let store = Arc::new(RedisTtlStore::new(
        redis_conn,
        Duration::from_millis(settings.redis.op_timeout_ms),
    ));
    tracing::info!("Redis connection initialized");

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations applied");

    let clients = Arc::new(PgServiceClientRepository::new(pool.clone()));
    let provisioned = provision_clients(clients.as_ref(), &settings.service_clients).await?;
    if provisioned > 0 {
        tracing::info!(count = provisioned, "Service clients provisioned");
    }

    let blacklist = Arc::new(TokenBlacklist::new(store.clone(), codec.clone()));
    let refresh_tokens = Arc::new(RefreshTokenStore::new(
        store,
        clock,
        settings.jwt.refresh_token_ttl_secs,
    )?);

    let state = web::Data::new(AppState {
        auth: Arc::new(AuthService::new(
            Arc::new(PgAccountDirectory::new(pool)),
            issuer.clone(),
            refresh_tokens,
            blacklist.clone(),
        )),
        client_credentials: Arc::new(ClientCredentialsIssuer::new(clients, issuer)),
        codec,
        blacklist,
    });

    let bind = (settings.server.host.clone(), settings.server.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(|cfg| routes::configure(cfg, &state))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
