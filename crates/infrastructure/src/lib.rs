//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod console_email_service;
mod encrypted_store;
mod rfc3339;
mod smtp_email_service;
mod sqlite_backup_code_repository;
mod sqlite_inbox_repository;
mod sqlite_notification_repository;
mod sqlite_pending_recovery_repository;
mod sqlite_pending_registration_repository;
mod sqlite_recovery_transaction;
mod sqlite_session_repository;
mod sqlite_user_repository;
mod sqlite_webauthn_challenge_repository;
mod sqlite_webauthn_credential_repository;
mod totp_provider;
mod webauthn_ceremony;

#[cfg(feature = "test-support")]
mod software_authenticator;

pub use argon2_password_hasher::Argon2BackupCodeHasher;
pub use console_email_service::ConsoleEmailService;
pub use encrypted_store::{EncryptedStore, StoreHealthReport};
pub use smtp_email_service::{SmtpEmailConfig, SmtpEmailService};
pub use sqlite_backup_code_repository::SqliteBackupCodeRepository;
pub use sqlite_inbox_repository::SqliteInboxRepository;
pub use sqlite_notification_repository::SqliteNotificationRepository;
pub use sqlite_pending_recovery_repository::SqlitePendingRecoveryRepository;
pub use sqlite_pending_registration_repository::SqlitePendingRegistrationRepository;
pub use sqlite_recovery_transaction::SqliteRecoveryTransaction;
pub use sqlite_session_repository::SqliteSessionRepository;
pub use sqlite_user_repository::SqliteUserRepository;
pub use sqlite_webauthn_challenge_repository::SqliteWebAuthnChallengeRepository;
pub use sqlite_webauthn_credential_repository::SqliteWebAuthnCredentialRepository;
pub use totp_provider::TotpRsProvider;
pub use webauthn_ceremony::{
    AuthenticationChallenge, RegistrationChallenge, WebAuthnCeremony, build_webauthn,
};

#[cfg(feature = "test-support")]
pub use software_authenticator::SoftwareAuthenticator;
