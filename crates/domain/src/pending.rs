use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Default TTL for a [`PendingRegistration`], in minutes.
pub const PENDING_REGISTRATION_TTL_MINUTES: i64 = 15;
/// Default TTL for a [`PendingRecovery`], in minutes.
pub const PENDING_RECOVERY_TTL_MINUTES: i64 = 15;

/// Surrogate identifier for a [`PendingRegistration`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistrationId(pub i64);

/// A short-lived, single-use token proving control of a chosen username
/// during registration.
///
/// *Invariant P1:* creating one for a username removes any prior pending
/// registration for the same username. Only the SHA-256 hash of the raw
/// token is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    /// Surrogate primary key.
    pub id: PendingRegistrationId,
    /// The username this token will bind to a new account.
    pub username: String,
    /// SHA-256 hash of the raw verification token.
    pub token_hash: String,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

/// Surrogate identifier for a [`PendingRecovery`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecoveryId(pub i64);

/// A short-lived, single-use magic-link token.
///
/// Creation removes any prior pending recovery for the same user. Consuming
/// it (via [`crate::Session`] creation) sets `used_at`; it is valid exactly
/// once, before `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecovery {
    /// Surrogate primary key.
    pub id: PendingRecoveryId,
    /// The user this magic link will sign in as.
    pub user_id: UserId,
    /// SHA-256 hash of the raw magic-link token.
    pub token_hash: String,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
    /// When the token was consumed, if ever.
    pub used_at: Option<DateTime<Utc>>,
}

impl PendingRecovery {
    /// Whether this token can still be redeemed as of `now`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now <= self.expires_at
    }
}
