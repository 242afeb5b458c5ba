use std::sync::Arc;

use chrono::{DateTime, Utc};
use shelfguard_core::{AppError, AppResult, Clock};
use shelfguard_domain::{AuthType, User, Username};

use crate::backup_code_vault::BackupCodeVault;
use crate::totp_codec::{TotpEnrollment, TotpProvider};
use crate::user_directory::UserRepository;

/// What a successful registration hands back to the caller: the new user
/// plus the TOTP enrollment and backup codes it will never see again.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    /// The newly created account.
    pub user: User,
    /// The secret and provisioning URI for the user's authenticator app.
    pub totp_enrollment: TotpEnrollment,
    /// The eight freshly generated backup codes, in plaintext.
    pub backup_codes: Vec<String>,
}

/// Completes a pending registration into a full account: only
/// [`AuthType::Totp`] is accepted today (see [`crate::PendingRegistrationService`]
/// for the token that gates reaching this step).
#[derive(Clone)]
pub struct RegistrationService {
    user_repository: Arc<dyn UserRepository>,
    backup_code_vault: BackupCodeVault,
    totp_provider: Arc<dyn TotpProvider>,
    clock: Arc<dyn Clock>,
}

impl RegistrationService {
    /// Creates a new service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        backup_code_vault: BackupCodeVault,
        totp_provider: Arc<dyn TotpProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            backup_code_vault,
            totp_provider,
            clock,
        }
    }

    /// Creates the account bound to `username`, enrolling a fresh TOTP
    /// secret and backup-code set. Fails with [`AppError::Input`] if the
    /// username was taken by a concurrent registration between token
    /// verification and this call.
    pub async fn complete_totp_registration(
        &self,
        username: &Username,
        recovery_email: Option<String>,
        recovery_phone: Option<String>,
    ) -> AppResult<RegistrationOutcome> {
        let now = self.clock.now();
        let (secret_bytes, totp_enrollment) = self.totp_provider.generate_secret(username.as_str())?;

        let Some(user) = self
            .user_repository
            .create(username, AuthType::Totp, secret_bytes, recovery_email, recovery_phone, now)
            .await?
        else {
            return Err(AppError::Input("username is already taken".to_owned()));
        };

        let backup_codes = self.backup_code_vault.create_codes_for_user(user.id, now).await?;

        Ok(RegistrationOutcome {
            user,
            totp_enrollment,
            backup_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use shelfguard_core::SystemClock;
    use shelfguard_domain::{BackupCode, BackupCodeId, UserId};

    use super::*;
    use crate::backup_code_vault::{BackupCodeHasher, BackupCodeRepository};

    #[derive(Default)]
    struct InMemoryUsers {
        users: Mutex<Vec<User>>,
        next_id: Mutex<i64>,
    }

    #[async_trait]
    impl UserRepository for InMemoryUsers {
        async fn find_by_username(&self, username: &Username) -> AppResult<Option<User>> {
            let users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            Ok(users.iter().find(|user| user.username == *username).cloned())
        }

        async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
            let users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            Ok(users.iter().find(|user| user.id == user_id).cloned())
        }

        async fn username_exists(&self, username: &Username) -> AppResult<bool> {
            let users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            Ok(users.iter().any(|user| user.username == *username))
        }

        async fn create(
            &self,
            username: &Username,
            auth_type: AuthType,
            auth_credential: Vec<u8>,
            recovery_email: Option<String>,
            recovery_phone: Option<String>,
            now: DateTime<Utc>,
        ) -> AppResult<Option<User>> {
            let mut users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            if users.iter().any(|user| user.username == *username) {
                return Ok(None);
            }
            let mut next_id = self.next_id.lock().unwrap_or_else(|poison| poison.into_inner());
            *next_id += 1;
            let user = User {
                id: UserId(*next_id),
                username: username.clone(),
                auth_type,
                auth_credential,
                can_download: false,
                is_admin: false,
                recovery_email,
                recovery_phone,
                created_at: now,
                last_login: None,
            };
            users.push(user.clone());
            Ok(Some(user))
        }

        async fn save(&self, user: &User) -> AppResult<()> {
            let mut users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(existing) = users.iter_mut().find(|existing| existing.id == user.id) {
                *existing = user.clone();
            }
            Ok(())
        }

        async fn update_last_login(&self, _user_id: UserId, _now: DateTime<Utc>) -> AppResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryBackupCodes {
        codes: Mutex<Vec<BackupCode>>,
        next_id: Mutex<i64>,
    }

    #[async_trait]
    impl BackupCodeRepository for InMemoryBackupCodes {
        async fn replace_active_codes(
            &self,
            user_id: UserId,
            hashes: Vec<String>,
            _now: DateTime<Utc>,
        ) -> AppResult<()> {
            let mut codes = self.codes.lock().unwrap_or_else(|poison| poison.into_inner());
            codes.retain(|code| code.user_id != user_id || code.used_at.is_some());
            let mut next_id = self.next_id.lock().unwrap_or_else(|poison| poison.into_inner());
            for hash in hashes {
                *next_id += 1;
                codes.push(BackupCode {
                    id: BackupCodeId(*next_id),
                    user_id,
                    code_hash: hash,
                    used_at: None,
                });
            }
            Ok(())
        }

        async fn active_codes(&self, user_id: UserId) -> AppResult<Vec<BackupCode>> {
            let codes = self.codes.lock().unwrap_or_else(|poison| poison.into_inner());
            Ok(codes
                .iter()
                .filter(|code| code.user_id == user_id && code.is_active())
                .cloned()
                .collect())
        }

        async fn consume_if_unused(&self, code_id: BackupCodeId, now: DateTime<Utc>) -> AppResult<bool> {
            let mut codes = self.codes.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(code) = codes.iter_mut().find(|code| code.id == code_id && code.used_at.is_none()) {
                code.used_at = Some(now);
                return Ok(true);
            }
            Ok(false)
        }

        async fn remaining_count(&self, user_id: UserId) -> AppResult<usize> {
            let codes = self.codes.lock().unwrap_or_else(|poison| poison.into_inner());
            Ok(codes.iter().filter(|code| code.user_id == user_id && code.is_active()).count())
        }
    }

    struct PassthroughHasher;

    impl BackupCodeHasher for PassthroughHasher {
        fn hash_code(&self, code: &str) -> AppResult<String> {
            Ok(format!("hash:{code}"))
        }

        fn verify_code(&self, code: &str, hash: &str) -> AppResult<bool> {
            Ok(hash == format!("hash:{code}"))
        }
    }

    struct FixedTotpProvider;

    impl TotpProvider for FixedTotpProvider {
        fn generate_secret(&self, account: &str) -> AppResult<(Vec<u8>, TotpEnrollment)> {
            Ok((
                vec![1; 20],
                TotpEnrollment {
                    secret_base32: "AAAA".to_owned(),
                    otpauth_uri: format!("otpauth://totp/ShelfGuard:{account}"),
                },
            ))
        }

        fn verify_code(&self, _secret_bytes: &[u8], _code: &str) -> AppResult<bool> {
            Ok(true)
        }

        fn qr_code_data_uri(&self, _secret_bytes: &[u8], _account: &str) -> AppResult<String> {
            Ok("data:image/png;base64,AAAA".to_owned())
        }
    }

    fn service() -> RegistrationService {
        RegistrationService::new(
            Arc::new(InMemoryUsers::default()),
            BackupCodeVault::new(Arc::new(InMemoryBackupCodes::default()), Arc::new(PassthroughHasher)),
            Arc::new(FixedTotpProvider),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn registration_issues_a_user_and_eight_codes() {
        let service = service();
        let username = Username::parse("newuser1").unwrap_or_else(|_| unreachable!());

        let outcome = service
            .complete_totp_registration(&username, None, None)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(outcome.user.username, username);
        assert_eq!(outcome.backup_codes.len(), shelfguard_domain::N_BACKUP_CODES);
    }

    #[tokio::test]
    async fn duplicate_username_is_an_input_error() {
        let service = service();
        let username = Username::parse("dupeuser1").unwrap_or_else(|_| unreachable!());

        service
            .complete_totp_registration(&username, None, None)
            .await
            .unwrap_or_else(|_| unreachable!());

        let result = service.complete_totp_registration(&username, None, None).await;
        assert!(matches!(result, Err(AppError::Input(_))));
    }
}
