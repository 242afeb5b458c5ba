//! Application services and ports.

#![forbid(unsafe_code)]

mod backup_code_vault;
mod email;
mod inbox_service;
mod notification_service;
mod pending_recovery_service;
mod pending_registration_service;
mod rate_limit_service;
mod recovery_protocol;
mod registration_service;
mod session_manager;
mod token_crypto;
mod totp_codec;
mod user_directory;
mod webauthn_authority;
mod webauthn_challenge_repository;

pub use backup_code_vault::{BackupCodeHasher, BackupCodeRepository, BackupCodeVault};
pub use email::EmailService;
pub use inbox_service::{InboxRepository, InboxService};
pub use notification_service::{NotificationRepository, NotificationService};
pub use pending_recovery_service::{
    MAGIC_LINK_GENERIC_MESSAGE, PendingRecoveryRepository, PendingRecoveryService,
};
pub use pending_registration_service::{PendingRegistrationRepository, PendingRegistrationService};
pub use rate_limit_service::{
    AttemptInfo, InMemoryRateLimitRepository, RateLimitRepository, RateLimitRule, RateLimitService,
};
pub use recovery_protocol::{BackupCodeRecoveryOutcome, BackupCodeRecoveryTransaction, RecoveryProtocolService};
pub use registration_service::{RegistrationOutcome, RegistrationService};
pub use session_manager::{SessionManager, SessionRepository, TOUCH_MIN_INTERVAL_SECONDS};
pub use token_crypto::{generate_token, hash_token};
pub use totp_codec::{TOTP_SECRET_LEN, TotpEnrollment, TotpProvider};
pub use user_directory::{UserDirectory, UserRepository};
pub use webauthn_authority::{WebAuthnAuthority, WebAuthnCredentialRepository};
pub use webauthn_challenge_repository::WebAuthnChallengeRepository;
