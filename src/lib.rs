pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{
    config::{SessionBackendKind, Settings},
    redis::RedisHandle,
    state::AppState,
    telemetry,
};
use crate::services::session_context::SessionStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    if settings.security().secret_key_generated {
        tracing::warn!("SECRET_KEY not set; using a generated key stored on disk");
    }

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    match redis.connect().await {
        Ok(()) => tracing::info!("Redis connected successfully"),
        Err(err) if settings.session().backend == SessionBackendKind::Redis => {
            return Err(anyhow::anyhow!("Redis is required for sessions: {err}"));
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to connect to Redis; sessions stay in memory");
        }
    }

    let sessions = SessionStore::from_settings(&settings, redis.clone());
    let state = AppState::new(settings, db_pool, redis.clone(), sessions);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        sessions = state.settings().session().backend.as_str(),
        "Exam portal listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
