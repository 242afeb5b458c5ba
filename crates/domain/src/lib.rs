//! Domain entities and invariants for the authentication subsystem.

#![forbid(unsafe_code)]

mod backup_code;
mod inbox;
mod notification;
mod pending;
mod session;
mod user;
mod webauthn_challenge;
mod webauthn_credential;

pub use backup_code::{
    BACKUP_CODE_GROUP_LEN, BACKUP_CODE_GROUPS, BackupCode, BackupCodeId, N_BACKUP_CODES,
};
pub use inbox::{ContactLog, InboxMessage, InboxMessageId, InboxStatus, ReplyMethod};
pub use notification::{Notification, NotificationDismissal, NotificationId};
pub use pending::{
    PENDING_RECOVERY_TTL_MINUTES, PENDING_REGISTRATION_TTL_MINUTES, PendingRecovery,
    PendingRecoveryId, PendingRegistration, PendingRegistrationId,
};
pub use session::{STALE_SESSION_GRACE_MINUTES, Session, SessionId};
pub use user::{AuthType, USERNAME_MAX_LEN, USERNAME_MIN_LEN, User, UserId, Username};
pub use webauthn_challenge::{WEBAUTHN_CHALLENGE_TTL_MINUTES, WebAuthnCeremonyPurpose, WebAuthnChallenge};
pub use webauthn_credential::{WebAuthnCredential, WebAuthnCredentialId};
