//! HTTP gateway for account registration, login, and recovery.
//!
//! Bootstraps the encrypted store, wires every application service against
//! its SQLite-backed adapter, and serves the `/auth` HTTP surface described
//! in [`router`].

#![forbid(unsafe_code)]

mod config;
mod cookies;
mod dto;
mod error;
mod handlers;
mod middleware;
mod router;
mod state;

use std::sync::Arc;

use shelfguard_application::{
    BackupCodeVault, InMemoryRateLimitRepository, InboxService, NotificationService,
    PendingRecoveryService, PendingRegistrationService, RateLimitService, RecoveryProtocolService,
    RegistrationService, SessionManager, UserDirectory,
};
use shelfguard_core::{AppResult, SystemClock};
use shelfguard_infrastructure::{
    Argon2BackupCodeHasher, ConsoleEmailService, EncryptedStore, SmtpEmailConfig,
    SmtpEmailService, SqliteBackupCodeRepository, SqliteInboxRepository,
    SqliteNotificationRepository, SqlitePendingRecoveryRepository,
    SqlitePendingRegistrationRepository, SqliteRecoveryTransaction, SqliteSessionRepository,
    SqliteUserRepository, TotpRsProvider,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{init_tracing, ApiConfig, EmailProviderConfig};
use crate::state::AppState;

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let store = EncryptedStore::open(&config.db_path, &config.keyfile_path).await?;
    let clock = Arc::new(SystemClock);

    let user_repository = Arc::new(SqliteUserRepository::new(store.clone()));
    let backup_code_hasher = Arc::new(Argon2BackupCodeHasher::new());
    let backup_code_vault = BackupCodeVault::new(
        Arc::new(SqliteBackupCodeRepository::new(store.clone())),
        backup_code_hasher,
    );
    let totp_provider = Arc::new(TotpRsProvider::new("ShelfGuard"));

    let email_service: Arc<dyn shelfguard_application::EmailService> = match &config.email_provider {
        EmailProviderConfig::Console => Arc::new(ConsoleEmailService::new()),
        EmailProviderConfig::Smtp(smtp) => Arc::new(SmtpEmailService::new(SmtpEmailConfig {
            host: smtp.host.clone(),
            port: smtp.port,
            username: smtp.username.clone(),
            password: smtp.password.clone(),
            from_address: smtp.from_address.clone(),
        })),
    };

    let session_manager = SessionManager::new(Arc::new(SqliteSessionRepository::new(store.clone())), clock.clone());
    let user_directory = UserDirectory::new(user_repository.clone());
    let registration_service = RegistrationService::new(
        user_repository.clone(),
        backup_code_vault.clone(),
        totp_provider.clone(),
        clock.clone(),
    );
    let pending_registration_service = PendingRegistrationService::new(
        Arc::new(SqlitePendingRegistrationRepository::new(store.clone())),
        clock.clone(),
    );
    let recovery_protocol_service = RecoveryProtocolService::new(
        user_repository.clone(),
        backup_code_vault.clone(),
        totp_provider.clone(),
        Arc::new(SqliteRecoveryTransaction::new(store.clone())),
    );
    let pending_recovery_service = PendingRecoveryService::new(
        Arc::new(SqlitePendingRecoveryRepository::new(store.clone())),
        user_repository.clone(),
        email_service,
        clock.clone(),
        config.base_url.clone(),
    );
    let inbox_service = InboxService::new(Arc::new(SqliteInboxRepository::new(store.clone())));
    let notification_service = NotificationService::new(Arc::new(SqliteNotificationRepository::new(store.clone())));
    let rate_limit_service = RateLimitService::new(Arc::new(InMemoryRateLimitRepository::default()));

    let app_state = AppState {
        store,
        clock,
        config: Arc::new(config),
        session_manager,
        user_directory,
        registration_service,
        pending_registration_service,
        recovery_protocol_service,
        pending_recovery_service,
        backup_code_vault,
        inbox_service,
        notification_service,
        rate_limit_service,
        totp_provider,
    };

    let bind_address = app_state.config.bind_address.clone();
    let router = router::build_router(app_state)?;

    let listener = TcpListener::bind(&bind_address).await.map_err(|error| {
        shelfguard_core::AppError::Store(format!("failed to bind {bind_address}: {error}"))
    })?;

    info!(%bind_address, "shelfguard-api listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|error| shelfguard_core::AppError::Store(format!("server error: {error}")))?;

    Ok(())
}
