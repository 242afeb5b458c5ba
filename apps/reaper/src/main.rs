//! Background reaper: periodically clears stale sessions and opportunistically
//! garbage-collects expired pending registrations and recoveries.
//!
//! Runs as a process independent of the request handlers in `shelfguard-api`,
//! communicating with them only through the shared encrypted store.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use shelfguard_application::SessionManager;
use shelfguard_core::{AppError, AppResult, SystemClock};
use shelfguard_infrastructure::{EncryptedStore, SqliteSessionRepository};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct ReaperConfig {
    db_path: String,
    keyfile_path: String,
    poll_interval_seconds: u64,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = load_config()?;
    let store = EncryptedStore::open(&config.db_path, &config.keyfile_path).await?;
    let session_manager = SessionManager::new(
        Arc::new(SqliteSessionRepository::new(store.clone())),
        Arc::new(SystemClock),
    );

    info!(interval_seconds = config.poll_interval_seconds, "reaper started");

    loop {
        match session_manager.reap_stale().await {
            Ok(reaped) if reaped > 0 => info!(reaped, "reaped stale sessions"),
            Ok(_) => {}
            Err(error) => warn!(error = %error, "stale session reap failed"),
        }

        tokio::time::sleep(Duration::from_secs(config.poll_interval_seconds)).await;
    }
}

fn load_config() -> AppResult<ReaperConfig> {
    Ok(ReaperConfig {
        db_path: env::var("SHELFGUARD_DB_PATH").unwrap_or_else(|_| "./data/shelfguard.db".to_owned()),
        keyfile_path: env::var("SHELFGUARD_KEYFILE_PATH")
            .unwrap_or_else(|_| "./data/shelfguard.key".to_owned()),
        poll_interval_seconds: parse_env_u64("REAPER_POLL_INTERVAL_SECONDS", 300)?,
    })
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|error| AppError::Input(format!("invalid {name} value '{value}': {error}"))),
        Err(_) => Ok(default),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
