//! WebAuthn/FIDO2 ceremony orchestration.
//!
//! Wraps a [`Webauthn`] relying-party instance (which owns every
//! cryptographic detail of attestation and assertion verification) and binds
//! its ceremony state to our own single-use, TTL-bound challenge store so
//! the two HTTP legs of a ceremony need not share in-memory state.
//!
//! No route in the gateway calls into this module today; registration and
//! login both accept only `"totp"` (see the `auth_type` column). It exists,
//! fully wired and tested against [`crate::SoftwareAuthenticator`], so that
//! adding a WebAuthn endpoint later is a routing change, not a rewrite.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfguard_application::{
    NotificationService, SessionManager, WebAuthnAuthority, WebAuthnChallengeRepository, hash_token,
};
use shelfguard_core::{AppError, AppResult, Clock};
use shelfguard_domain::{UserId, WebAuthnCeremonyPurpose, WEBAUTHN_CHALLENGE_TTL_MINUTES};
use tracing::warn;
use url::Url;
use uuid::Uuid;
use webauthn_rs::{Webauthn, WebauthnBuilder};
use webauthn_rs::prelude::{
    CreationChallengeResponse, Passkey, PasskeyAuthentication, PasskeyRegistration,
    PublicKeyCredential, RegisterPublicKeyCredential, RequestChallengeResponse,
};

/// Builds the relying-party runtime from a configured id and origin.
///
/// `rp_id` is the effective domain (e.g. `shelfguard.example.com`); `origin`
/// is the full scheme-and-host the browser reports (e.g.
/// `https://shelfguard.example.com`).
pub fn build_webauthn(rp_id: &str, origin: &str, rp_name: &str) -> AppResult<Arc<Webauthn>> {
    let origin = Url::parse(origin)
        .map_err(|error| AppError::Input(format!("invalid WebAuthn origin '{origin}': {error}")))?;

    let webauthn = WebauthnBuilder::new(rp_id, &origin)
        .map_err(|error| AppError::Input(format!("invalid WebAuthn relying party config: {error}")))?
        .rp_name(rp_name)
        .build()
        .map_err(|error| AppError::Store(format!("failed to initialize WebAuthn runtime: {error}")))?;

    Ok(Arc::new(webauthn))
}

/// Issued in response to a registration start request; `raw_token` must be
/// echoed back (e.g. in a follow-up header or hidden field) with the
/// attestation response so the server can retrieve its ceremony state.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationChallenge {
    pub raw_token: String,
    pub options: CreationChallengeResponse,
}

/// Issued in response to an authentication start request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticationChallenge {
    pub raw_token: String,
    pub options: RequestChallengeResponse,
}

#[derive(Serialize, Deserialize)]
struct RegistrationState {
    reg_state: PasskeyRegistration,
}

#[derive(Serialize, Deserialize)]
struct AuthenticationState {
    user_id: i64,
    existing: Vec<StoredPasskey>,
    auth_state: PasskeyAuthentication,
}

#[derive(Serialize, Deserialize)]
struct StoredPasskey {
    credential_row_id: i64,
    passkey: Passkey,
}

/// Orchestrates WebAuthn registration and authentication ceremonies.
#[derive(Clone)]
pub struct WebAuthnCeremony {
    webauthn: Arc<Webauthn>,
    challenges: Arc<dyn WebAuthnChallengeRepository>,
    authority: WebAuthnAuthority,
    sessions: SessionManager,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
}

impl WebAuthnCeremony {
    /// Creates a new ceremony orchestrator. `sessions` and `notifications`
    /// carry out invariant W1's clone-detection side effects: every active
    /// session for the affected user is invalidated, and the user is
    /// notified on next login.
    #[must_use]
    pub fn new(
        webauthn: Arc<Webauthn>,
        challenges: Arc<dyn WebAuthnChallengeRepository>,
        authority: WebAuthnAuthority,
        sessions: SessionManager,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            webauthn,
            challenges,
            authority,
            sessions,
            notifications,
            clock,
        }
    }

    /// Starts a registration ceremony for `user_id`, excluding any
    /// already-enrolled credentials so authenticators avoid re-registering
    /// the same key.
    pub async fn start_registration(
        &self,
        user_id: UserId,
        username: &str,
        existing_credential_ids: Vec<Vec<u8>>,
    ) -> AppResult<RegistrationChallenge> {
        let user_handle = user_uuid(user_id);
        let exclude = (!existing_credential_ids.is_empty()).then(|| {
            existing_credential_ids
                .into_iter()
                .map(Into::into)
                .collect()
        });

        let (options, reg_state) = self
            .webauthn
            .start_passkey_registration(user_handle, username, username, exclude)
            .map_err(|error| AppError::Store(format!("failed to start passkey registration: {error}")))?;

        let state_blob = serde_json::to_vec(&RegistrationState { reg_state })
            .map_err(|error| AppError::Store(format!("failed to encode registration state: {error}")))?;

        let raw_token = self
            .issue_challenge(Some(user_id), WebAuthnCeremonyPurpose::Register, state_blob)
            .await?;

        Ok(RegistrationChallenge { raw_token, options })
    }

    /// Finishes a registration ceremony, verifying the attestation and
    /// recording the resulting credential.
    pub async fn finish_registration(
        &self,
        raw_token: &str,
        user_id: UserId,
        response: &RegisterPublicKeyCredential,
    ) -> AppResult<()> {
        let now = self.clock.now();
        let challenge = self
            .consume(raw_token, WebAuthnCeremonyPurpose::Register, now)
            .await?;

        if challenge.user_id != Some(user_id) {
            warn!("webauthn registration challenge was issued to a different user");
            return Err(AppError::Authentication);
        }

        let state: RegistrationState = serde_json::from_slice(&challenge.state_blob)
            .map_err(|error| AppError::Store(format!("corrupt registration state: {error}")))?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(response, &state.reg_state)
            .map_err(|error| {
                warn!(error = %error, "passkey registration rejected");
                AppError::Authentication
            })?;

        let credential_id = passkey.cred_id().as_ref().to_vec();
        let public_key = serde_json::to_vec(&passkey)
            .map_err(|error| AppError::Store(format!("failed to encode passkey: {error}")))?;

        self.authority
            .register_credential(user_id, credential_id, public_key)
            .await
    }

    /// Starts an authentication ceremony against the user's already
    /// enrolled, non-revoked credentials.
    pub async fn start_authentication(&self, user_id: UserId) -> AppResult<AuthenticationChallenge> {
        let stored = self.authority.credentials_for_user(user_id).await?;
        if stored.is_empty() {
            return Err(AppError::Input("no WebAuthn credentials are enrolled".to_owned()));
        }

        let mut passkeys = Vec::with_capacity(stored.len());
        let mut rows = Vec::with_capacity(stored.len());
        for credential in &stored {
            let passkey: Passkey = serde_json::from_slice(&credential.public_key)
                .map_err(|error| AppError::Store(format!("corrupt stored passkey: {error}")))?;
            rows.push(StoredPasskey {
                credential_row_id: credential.id.0,
                passkey: passkey.clone(),
            });
            passkeys.push(passkey);
        }

        let (options, auth_state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|error| AppError::Store(format!("failed to start passkey authentication: {error}")))?;

        let state_blob = serde_json::to_vec(&AuthenticationState {
            user_id: user_id.0,
            existing: rows,
            auth_state,
        })
        .map_err(|error| AppError::Store(format!("failed to encode authentication state: {error}")))?;

        let raw_token = self
            .issue_challenge(Some(user_id), WebAuthnCeremonyPurpose::Authenticate, state_blob)
            .await?;

        Ok(AuthenticationChallenge { raw_token, options })
    }

    /// Finishes an authentication ceremony, applying invariant W1 clone
    /// detection via [`WebAuthnAuthority::record_assertion`].
    pub async fn finish_authentication(
        &self,
        raw_token: &str,
        response: &PublicKeyCredential,
    ) -> AppResult<UserId> {
        let now = self.clock.now();
        let challenge = self
            .consume(raw_token, WebAuthnCeremonyPurpose::Authenticate, now)
            .await?;

        let state: AuthenticationState = serde_json::from_slice(&challenge.state_blob)
            .map_err(|error| AppError::Store(format!("corrupt authentication state: {error}")))?;

        let auth_result = self
            .webauthn
            .finish_passkey_authentication(response, &state.auth_state)
            .map_err(|error| {
                warn!(error = %error, "passkey authentication rejected");
                AppError::Authentication
            })?;

        let matched = state
            .existing
            .iter()
            .find(|row| row.passkey.cred_id() == auth_result.cred_id())
            .ok_or(AppError::Authentication)?;

        let user_id = UserId(state.user_id);
        let credentials = self.authority.credentials_for_user(user_id).await?;
        let credential = credentials
            .into_iter()
            .find(|credential| credential.id.0 == matched.credential_row_id)
            .ok_or(AppError::Authentication)?;

        let new_count = auth_result.counter();
        if let Err(error) = self.authority.record_assertion(&credential, new_count).await {
            if matches!(error, AppError::CloneSuspected) {
                self.sessions.invalidate_user_sessions(user_id).await?;
                self.notifications
                    .notify_user(
                        user_id,
                        "A sign-in attempt with one of your security keys was rejected because it reused an \
                         old signature counter, which usually means the key was cloned. All of your sessions \
                         have been signed out and the key has been removed from your account.",
                        "webauthn_clone_suspected",
                        2,
                        true,
                        now,
                    )
                    .await?;
            }
            return Err(error);
        }

        Ok(user_id)
    }

    async fn issue_challenge(
        &self,
        user_id: Option<UserId>,
        purpose: WebAuthnCeremonyPurpose,
        state_blob: Vec<u8>,
    ) -> AppResult<String> {
        let now = self.clock.now();
        let expires_at = now + chrono::Duration::minutes(WEBAUTHN_CHALLENGE_TTL_MINUTES);
        let (raw_token, token_hash) = shelfguard_application::generate_token()?;

        self.challenges
            .create(user_id, purpose, token_hash, state_blob, now, expires_at)
            .await?;

        Ok(raw_token)
    }

    async fn consume(
        &self,
        raw_token: &str,
        purpose: WebAuthnCeremonyPurpose,
        now: DateTime<Utc>,
    ) -> AppResult<shelfguard_domain::WebAuthnChallenge> {
        let token_hash = hash_token(raw_token);
        self.challenges
            .consume_valid(&token_hash, purpose, now)
            .await?
            .ok_or(AppError::Authentication)
    }
}

fn user_uuid(user_id: UserId) -> Uuid {
    Uuid::from_u128(user_id.0 as u128)
}

#[cfg(all(test, feature = "test-support"))]
mod tests {
    use std::sync::Arc;

    use shelfguard_application::{
        NotificationService, SessionManager, WebAuthnAuthority, WebAuthnCredentialRepository,
    };
    use shelfguard_core::{AppError, SystemClock};
    use shelfguard_domain::UserId;

    use crate::SoftwareAuthenticator;
    use crate::encrypted_store::EncryptedStore;
    use crate::sqlite_notification_repository::SqliteNotificationRepository;
    use crate::sqlite_session_repository::SqliteSessionRepository;
    use crate::sqlite_webauthn_challenge_repository::SqliteWebAuthnChallengeRepository;
    use crate::sqlite_webauthn_credential_repository::SqliteWebAuthnCredentialRepository;

    use super::{WebAuthnCeremony, build_webauthn};

    const ORIGIN: &str = "https://shelfguard.example.com";
    const RP_ID: &str = "shelfguard.example.com";

    async fn ceremony() -> (WebAuthnCeremony, Arc<dyn WebAuthnCredentialRepository>, SessionManager, NotificationService) {
        let store = EncryptedStore::open_in_memory().await.unwrap_or_else(|_| unreachable!());
        let webauthn = build_webauthn(RP_ID, ORIGIN, "ShelfGuard").unwrap_or_else(|_| unreachable!());
        let challenges = Arc::new(SqliteWebAuthnChallengeRepository::new(store.clone()));
        let credentials: Arc<dyn WebAuthnCredentialRepository> =
            Arc::new(SqliteWebAuthnCredentialRepository::new(store.clone()));
        let authority = WebAuthnAuthority::new(credentials.clone());
        let sessions = SessionManager::new(Arc::new(SqliteSessionRepository::new(store.clone())), Arc::new(SystemClock));
        let notifications = NotificationService::new(Arc::new(SqliteNotificationRepository::new(store)));
        let ceremony = WebAuthnCeremony::new(
            webauthn,
            challenges,
            authority,
            sessions.clone(),
            notifications.clone(),
            Arc::new(SystemClock),
        );
        (ceremony, credentials, sessions, notifications)
    }

    #[tokio::test]
    async fn registration_then_authentication_round_trips() {
        let (ceremony, credentials, _sessions, _notifications) = ceremony().await;
        let authenticator = SoftwareAuthenticator::new(ORIGIN);
        let user_id = UserId(1);

        let registration = ceremony
            .start_registration(user_id, "alice", vec![])
            .await
            .unwrap_or_else(|_| unreachable!());
        let attestation = authenticator.register(&registration.options).unwrap_or_else(|_| unreachable!());
        ceremony
            .finish_registration(&registration.raw_token, user_id, &attestation)
            .await
            .unwrap_or_else(|_| unreachable!());

        let enrolled = credentials.list_for_user(user_id).await.unwrap_or_else(|_| unreachable!());
        assert_eq!(enrolled.len(), 1);
        assert_eq!(enrolled[0].sign_count, 0);

        let authentication = ceremony.start_authentication(user_id).await.unwrap_or_else(|_| unreachable!());
        let assertion = authenticator.authenticate(&authentication.options).unwrap_or_else(|_| unreachable!());
        let authenticated_user = ceremony
            .finish_authentication(&authentication.raw_token, &assertion)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(authenticated_user, user_id);
        let enrolled = credentials.list_for_user(user_id).await.unwrap_or_else(|_| unreachable!());
        assert_eq!(enrolled[0].sign_count, 1);
    }

    #[tokio::test]
    async fn reused_challenge_token_is_rejected() {
        let (ceremony, _credentials, _sessions, _notifications) = ceremony().await;
        let authenticator = SoftwareAuthenticator::new(ORIGIN);
        let user_id = UserId(1);

        let registration = ceremony
            .start_registration(user_id, "alice", vec![])
            .await
            .unwrap_or_else(|_| unreachable!());
        let attestation = authenticator.register(&registration.options).unwrap_or_else(|_| unreachable!());
        ceremony
            .finish_registration(&registration.raw_token, user_id, &attestation)
            .await
            .unwrap_or_else(|_| unreachable!());

        let replay = ceremony.finish_registration(&registration.raw_token, user_id, &attestation).await;
        assert!(matches!(replay, Err(AppError::Authentication)));
    }

    #[tokio::test]
    async fn non_advancing_sign_counter_revokes_the_credential() {
        let (ceremony, credentials, sessions, notifications) = ceremony().await;
        let authenticator = SoftwareAuthenticator::new(ORIGIN);
        let user_id = UserId(1);

        let registration = ceremony
            .start_registration(user_id, "alice", vec![])
            .await
            .unwrap_or_else(|_| unreachable!());
        let attestation = authenticator.register(&registration.options).unwrap_or_else(|_| unreachable!());
        ceremony
            .finish_registration(&registration.raw_token, user_id, &attestation)
            .await
            .unwrap_or_else(|_| unreachable!());

        let authentication = ceremony.start_authentication(user_id).await.unwrap_or_else(|_| unreachable!());
        let assertion = authenticator.authenticate(&authentication.options).unwrap_or_else(|_| unreachable!());
        ceremony
            .finish_authentication(&authentication.raw_token, &assertion)
            .await
            .unwrap_or_else(|_| unreachable!());

        let (_session, active_token) = sessions
            .create_for_user(user_id, None, None)
            .await
            .unwrap_or_else(|_| unreachable!());

        authenticator.rewind_sign_count(0);
        let cloned_authentication =
            ceremony.start_authentication(user_id).await.unwrap_or_else(|_| unreachable!());
        let cloned_assertion = authenticator
            .authenticate(&cloned_authentication.options)
            .unwrap_or_else(|_| unreachable!());
        let outcome = ceremony
            .finish_authentication(&cloned_authentication.raw_token, &cloned_assertion)
            .await;

        assert!(matches!(outcome, Err(AppError::CloneSuspected)));
        let enrolled = credentials.list_for_user(user_id).await.unwrap_or_else(|_| unreachable!());
        assert!(enrolled.is_empty(), "clone-suspected credential should no longer be listed");

        let resolved = sessions.get_by_token(&active_token).await.unwrap_or_else(|_| unreachable!());
        assert!(resolved.is_none(), "clone detection should invalidate the user's sessions");

        let active_notifications = notifications.active_for_user(user_id).await.unwrap_or_else(|_| unreachable!());
        assert!(
            active_notifications
                .iter()
                .any(|notification| notification.notification_type == "webauthn_clone_suspected"),
            "clone detection should raise a notification"
        );
    }
}
