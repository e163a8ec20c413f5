//! # fogd — FOG API daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`fogd.toml` plus `FOG_*` environment overrides)
//! - Initialize logging, the `SQLite` pool and its migrations
//! - Seed API settings and the administrator account
//! - Install the configured plugins and register their hooks
//! - Build the axum router and serve until SIGINT/SIGTERM
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use fog_adapter_http_axum::router;
use fog_adapter_http_axum::state::AppState;
use fog_adapter_storage_sqlite_sqlx::{SqliteRecordRepository, SqliteWindowsKeyStore};
use fog_app::services::auth_service::AuthService;
use fog_app::ports::RecordRepository;
use fog_app::services::plugin_service::PluginService;
use fog_app::services::settings::{API_ENABLED, API_TOKEN, SettingsService};
use tracing_subscriber::EnvFilter;

use crate::config::{ApiConfig, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = fog_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let records = Arc::new(SqliteRecordRepository::new(pool.clone()));
    let windows_keys = Arc::new(SqliteWindowsKeyStore::new(pool));

    // Settings and accounts
    let settings = SettingsService::new(Arc::clone(&records));
    if let Some(token) = seed_api_settings(&settings, &config.api).await? {
        tracing::info!(token = %token, "generated system API token");
    }
    AuthService::new(Arc::clone(&records))
        .ensure_user(
            &config.admin.user,
            &config.admin.password,
            config.admin.token.as_deref(),
        )
        .await?;

    // Plugins
    let plugins = PluginService::new(Arc::clone(&records), windows_keys);
    for name in &config.plugins.install {
        plugins.install(name).await?;
    }

    // HTTP
    let hooks = fog_app::hooks::bundled(Arc::clone(&records));
    let state = AppState::new(records, Arc::new(hooks), &config.api.base_path);
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, base_path = %config.api.base_path, "fogd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("fogd stopped");
    Ok(())
}

/// Seed `FOG_API_ENABLED` and `FOG_API_TOKEN` when absent.
///
/// Returns the token when one had to be generated, so it can be shown once.
async fn seed_api_settings<R: RecordRepository>(
    settings: &SettingsService<R>,
    api: &ApiConfig,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let generated = api.token.is_empty() && settings.get(API_TOKEN).await?.is_none();
    let token = if api.token.is_empty() {
        uuid::Uuid::new_v4().simple().to_string()
    } else {
        api.token.clone()
    };
    let enabled = if api.enabled { "1" } else { "0" };
    settings
        .ensure_defaults(&[(API_ENABLED, enabled), (API_TOKEN, &token)])
        .await?;
    Ok(generated.then_some(token))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settings() -> SettingsService<SqliteRecordRepository> {
        let db = fog_adapter_storage_sqlite_sqlx::Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SettingsService::new(Arc::new(SqliteRecordRepository::new(db.pool().clone())))
    }

    #[tokio::test]
    async fn should_report_generated_token_only_on_first_seed() {
        let settings = settings().await;
        let api = ApiConfig::default();

        let token = seed_api_settings(&settings, &api).await.unwrap().unwrap();
        assert_eq!(settings.get(API_TOKEN).await.unwrap(), Some(token));
        assert_eq!(seed_api_settings(&settings, &api).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_not_report_configured_token() {
        let settings = settings().await;
        let api = ApiConfig {
            token: "configured".to_string(),
            ..ApiConfig::default()
        };

        assert_eq!(seed_api_settings(&settings, &api).await.unwrap(), None);
        assert_eq!(settings.get(API_TOKEN).await.unwrap().as_deref(), Some("configured"));
    }
}
