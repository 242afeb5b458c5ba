use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::AppResult;
use shelfguard_domain::{UserId, WebAuthnCeremonyPurpose, WebAuthnChallenge};

/// Persistence port for [`WebAuthnChallenge`] rows.
///
/// This is a pure storage port; the ceremony cryptography (challenge
/// construction, attestation and assertion verification) lives in the
/// infrastructure adapter that owns the relying-party library.
#[async_trait]
pub trait WebAuthnChallengeRepository: Send + Sync {
    /// Issues a challenge bound to `(user_id, purpose)`, expiring at
    /// `expires_at`. `token_hash` is produced by the caller via
    /// [`crate::hash_token`] of a freshly generated token.
    async fn create(
        &self,
        user_id: Option<UserId>,
        purpose: WebAuthnCeremonyPurpose,
        token_hash: String,
        state_blob: Vec<u8>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<WebAuthnChallenge>;

    /// Atomically resolves and consumes the challenge matching
    /// `token_hash`, iff it is unused, unexpired, and bound to `purpose`.
    async fn consume_valid(
        &self,
        token_hash: &str,
        purpose: WebAuthnCeremonyPurpose,
        now: DateTime<Utc>,
    ) -> AppResult<Option<WebAuthnChallenge>>;
}
