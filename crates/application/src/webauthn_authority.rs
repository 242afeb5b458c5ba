use std::sync::Arc;

use async_trait::async_trait;
use shelfguard_core::{AppError, AppResult};
use shelfguard_domain::{UserId, WebAuthnCredential, WebAuthnCredentialId};

/// Persistence port for [`WebAuthnCredential`] rows.
///
/// The ceremony cryptography itself (challenge issuance, attestation and
/// assertion verification) is handled by the gateway layer against a
/// dedicated WebAuthn client; this port only covers the credential
/// registry and the sign-counter bookkeeping needed to detect cloning.
#[async_trait]
pub trait WebAuthnCredentialRepository: Send + Sync {
    /// Lists every non-revoked credential for a user.
    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<WebAuthnCredential>>;

    /// Persists a newly registered credential with `sign_count = 0`.
    async fn insert(&self, user_id: UserId, credential_id: Vec<u8>, public_key: Vec<u8>) -> AppResult<()>;

    /// Finds a credential by its authenticator-assigned id.
    async fn find_by_credential_id(&self, credential_id: &[u8]) -> AppResult<Option<WebAuthnCredential>>;

    /// Atomically advances `sign_count` if and only if `new_count >
    /// stored.sign_count`. Returns `false` without writing if the counter
    /// did not advance — the caller must treat this as a suspected clone.
    async fn advance_sign_count_if_greater(
        &self,
        credential_id: WebAuthnCredentialId,
        new_count: u32,
    ) -> AppResult<bool>;

    /// Marks a credential revoked after a sign-counter regression.
    async fn revoke(&self, credential_id: WebAuthnCredentialId) -> AppResult<()>;
}

/// Credential registry and clone-detection bookkeeping for WebAuthn.
#[derive(Clone)]
pub struct WebAuthnAuthority {
    repository: Arc<dyn WebAuthnCredentialRepository>,
}

impl WebAuthnAuthority {
    /// Creates a new authority over the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn WebAuthnCredentialRepository>) -> Self {
        Self { repository }
    }

    /// Records a freshly verified registration ceremony.
    pub async fn register_credential(
        &self,
        user_id: UserId,
        credential_id: Vec<u8>,
        public_key: Vec<u8>,
    ) -> AppResult<()> {
        self.repository.insert(user_id, credential_id, public_key).await
    }

    /// Lists credentials available for an authentication ceremony.
    pub async fn credentials_for_user(&self, user_id: UserId) -> AppResult<Vec<WebAuthnCredential>> {
        self.repository.list_for_user(user_id).await
    }

    /// Validates and records a freshly verified assertion's sign counter.
    ///
    /// *Invariant W1.* A non-advancing counter revokes the credential and
    /// returns [`AppError::CloneSuspected`]; callers are responsible for
    /// invalidating the affected user's sessions and surfacing a
    /// notification, since that spans services this authority does not own.
    pub async fn record_assertion(
        &self,
        credential: &WebAuthnCredential,
        new_sign_count: u32,
    ) -> AppResult<()> {
        let advanced = self
            .repository
            .advance_sign_count_if_greater(credential.id, new_sign_count)
            .await?;

        if advanced {
            return Ok(());
        }

        self.repository.revoke(credential.id).await?;
        Err(AppError::CloneSuspected)
    }
}
