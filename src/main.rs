mod app;
mod auth;
mod clock;
mod config;
mod error;
mod state;

use std::{sync::Arc, time::Duration};

use crate::auth::service::Authenticator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "platform_auth=debug,axum=info,tower_http=info".to_string());
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

    let (app_state, db) = state::AppState::init().await?;
    tracing::info!(
        environment = ?app_state.config.environment,
        lockout_store = ?app_state.config.lockout.store,
        max_attempts = app_state.config.lockout.max_attempts,
        window_secs = app_state.config.lockout.window_secs,
        "configuration loaded"
    );

    sqlx::migrate!("./migrations").run(&db).await?;

    if let Some(path) = app_state.config.import_users_file.clone() {
        if let Err(e) = app_state.auth.import_legacy_users(&path).await {
            tracing::warn!(error = %format!("{e:#}"), "legacy user import failed; continuing");
        }
    }

    spawn_attempt_purge(app_state.auth.clone());

    let addr = app_state.config.listen_addr()?;
    let app = app::build_app(app_state);
    app::serve(app, addr).await
}

/// Evicts attempt records once per lockout window.
fn spawn_attempt_purge(auth: Arc<Authenticator>) {
    let period = Duration::from_secs(auth.policy().window.whole_seconds().max(1) as u64);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if let Err(e) = auth.purge_expired_attempts().await {
                tracing::warn!(error = %e, "login attempt purge failed");
            }
        }
    });
}
