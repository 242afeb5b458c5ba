use std::sync::Arc;

use shelfguard_application::{
    BackupCodeVault, InboxService, NotificationService, PendingRecoveryService,
    PendingRegistrationService, RateLimitService, RecoveryProtocolService, RegistrationService,
    SessionManager, TotpProvider, UserDirectory,
};
use shelfguard_core::Clock;
use shelfguard_infrastructure::EncryptedStore;

use crate::config::ApiConfig;

/// Everything a handler needs, built once at startup and cheaply cloned per
/// request (every field is an `Arc`-backed service handle).
///
/// Deliberately excludes `WebAuthnCeremony`: registration and login accept
/// only the TOTP second factor today, and the ceremony has no reachable
/// route to wire it to.
#[derive(Clone)]
pub struct AppState {
    pub store: EncryptedStore,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ApiConfig>,
    pub session_manager: SessionManager,
    pub user_directory: UserDirectory,
    pub registration_service: RegistrationService,
    pub pending_registration_service: PendingRegistrationService,
    pub recovery_protocol_service: RecoveryProtocolService,
    pub pending_recovery_service: PendingRecoveryService,
    pub backup_code_vault: BackupCodeVault,
    pub inbox_service: InboxService,
    pub notification_service: NotificationService,
    pub rate_limit_service: RateLimitService,
    pub totp_provider: Arc<dyn TotpProvider>,
}
