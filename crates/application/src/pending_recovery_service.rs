use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::{AppError, AppResult, Clock};
use shelfguard_domain::{PENDING_RECOVERY_TTL_MINUTES, PendingRecovery, UserId, Username};
use tracing::warn;

use crate::email::EmailService;
use crate::token_crypto::{generate_token, hash_token};
use crate::user_directory::UserRepository;

/// The exact response both the existing-user and absent-user branches of
/// the magic-link request must produce, so a network observer cannot tell
/// them apart.
pub const MAGIC_LINK_GENERIC_MESSAGE: &str =
    "If an account exists with that username and has a registered email, a login link has been sent.";

/// Persistence port for [`PendingRecovery`] rows.
#[async_trait]
pub trait PendingRecoveryRepository: Send + Sync {
    /// Creates a pending recovery for `user_id`, first deleting any prior
    /// pending recovery for that user.
    async fn create(
        &self,
        user_id: UserId,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> AppResult<PendingRecovery>;

    /// Atomically marks the pending recovery matching `token_hash` used,
    /// iff it is unused and unexpired as of `now`, returning it.
    async fn consume_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingRecovery>>;
}

/// The magic-link protocol: a time-limited, emailed URL that creates a
/// session without the second factor.
#[derive(Clone)]
pub struct PendingRecoveryService {
    repository: Arc<dyn PendingRecoveryRepository>,
    user_repository: Arc<dyn UserRepository>,
    email_service: Arc<dyn EmailService>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl PendingRecoveryService {
    /// Creates a new service. `base_url` is concatenated with the fixed
    /// `/verify.html?token=...` relative path to preserve compatibility
    /// with existing frontends.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PendingRecoveryRepository>,
        user_repository: Arc<dyn UserRepository>,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            user_repository,
            email_service,
            clock,
            base_url: base_url.into(),
        }
    }

    /// Requests a magic link for `username`. Always succeeds from the
    /// caller's perspective; a pending recovery is only created, and an
    /// email only sent, if the user exists and has `recovery_enabled`.
    /// Email delivery failure is logged and otherwise invisible.
    pub async fn request_magic_link(&self, username: &Username) -> AppResult<()> {
        let Some(user) = self.user_repository.find_by_username(username).await? else {
            return Ok(());
        };

        let Some(recovery_email) = user.recovery_email.clone().filter(|_| user.recovery_enabled())
        else {
            return Ok(());
        };

        let (raw_token, token_hash) = generate_token()?;
        let expires_at = self.clock.now() + chrono::Duration::minutes(PENDING_RECOVERY_TTL_MINUTES);
        self.repository
            .create(user.id, token_hash, expires_at)
            .await?;

        let verify_url = format!("{}/verify.html?token={raw_token}", self.base_url);
        let body = format!("Use this link to sign in: {verify_url}\n\nThis link expires in {PENDING_RECOVERY_TTL_MINUTES} minutes.");

        if let Err(error) = self
            .email_service
            .send_email(&recovery_email, "Your sign-in link", &body, None)
            .await
        {
            warn!(error = %error, "magic-link email delivery failed");
        }

        Ok(())
    }

    /// Redeems a raw magic-link token, returning the user to sign in as.
    /// Fails with [`AppError::Authentication`] if the token is absent,
    /// expired, or already used.
    pub async fn verify(&self, raw_token: &str) -> AppResult<UserId> {
        let token_hash = hash_token(raw_token);
        let now = self.clock.now();

        let pending = self
            .repository
            .consume_valid(&token_hash, now)
            .await?
            .ok_or(AppError::Authentication)?;

        Ok(pending.user_id)
    }
}
