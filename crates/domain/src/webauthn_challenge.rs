use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// TTL for a WebAuthn registration or authentication challenge, in minutes.
pub const WEBAUTHN_CHALLENGE_TTL_MINUTES: i64 = 5;

/// Which WebAuthn ceremony a challenge was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebAuthnCeremonyPurpose {
    /// `navigator.credentials.create()` — registering a new credential.
    Register,
    /// `navigator.credentials.get()` — authenticating with an existing one.
    Authenticate,
}

/// A single-use, TTL-bound WebAuthn ceremony challenge.
///
/// Bound to `(user_id, purpose)` at issuance time per §4.4; `state_blob`
/// carries the serialized ceremony state the relying-party library needs to
/// finish verification (registration/authentication options plus the raw
/// challenge), so the server need not keep ceremony state in memory between
/// the two HTTP legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebAuthnChallenge {
    /// SHA-256 hash of the raw challenge token handed to the client.
    pub token_hash: String,
    /// The user this challenge is bound to; `None` for a discoverable-
    /// credential authentication ceremony that has not yet resolved a user.
    pub user_id: Option<UserId>,
    /// Which ceremony this challenge authorizes.
    pub purpose: WebAuthnCeremonyPurpose,
    /// Opaque ceremony state, serialized by the relying-party library.
    pub state_blob: Vec<u8>,
    /// When the challenge was issued.
    pub created_at: DateTime<Utc>,
    /// When the challenge expires.
    pub expires_at: DateTime<Utc>,
    /// When the challenge was consumed, if ever.
    pub used_at: Option<DateTime<Utc>>,
}

impl WebAuthnChallenge {
    /// Whether this challenge can still be redeemed as of `now`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now <= self.expires_at
    }
}
