use std::time::Duration;

use time::OffsetDateTime;

mod app;
mod auth;
mod categories;
mod config;
mod db;
mod dto;
mod error;
mod extract;
mod memory;
mod recipes;
mod state;
mod throttle;
mod users;

const TOKEN_PURGE_EVERY: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "receitas=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    throttle::spawn_cleanup(app_state.limiter.clone());

    let tokens = app_state.tokens.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_PURGE_EVERY);
        loop {
            interval.tick().await;
            match tokens.purge_expired(OffsetDateTime::now_utc()).await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "expired access tokens purged"),
                Err(e) => tracing::warn!(error = %e, "token purge failed"),
            }
        }
    });

    let config = app_state.config.clone();
    app::serve(app::build_app(app_state), &config).await
}
