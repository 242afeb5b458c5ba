use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::{AppError, AppResult};
use shelfguard_domain::{BackupCodeId, UserId, Username};

use crate::backup_code_vault::BackupCodeVault;
use crate::totp_codec::{TotpEnrollment, TotpProvider};
use crate::user_directory::UserRepository;

/// What a successful §4.7 recovery hands back to the caller.
#[derive(Debug, Clone)]
pub struct BackupCodeRecoveryOutcome {
    /// The freshly generated TOTP secret, base32-encoded.
    pub totp_enrollment: TotpEnrollment,
    /// The eight freshly generated backup codes, in plaintext.
    pub new_backup_codes: Vec<String>,
    /// How many codes from the pre-rotation set remained unconsumed at the
    /// moment the triggering code was redeemed (out of the prior eight).
    pub remaining_old_codes: usize,
}

/// The storage-side half of the all-or-nothing recovery sequence: in a
/// single transaction, consumes the triggering backup code (no-op if it was
/// already used by a concurrent caller), and — only if that consumption
/// took effect — rewrites the user's second factor, replaces their backup
/// codes, and invalidates every session they hold. Nothing is written if
/// the code turns out to already be used.
#[async_trait]
pub trait BackupCodeRecoveryTransaction: Send + Sync {
    /// Performs the sequence described above. Returns the number of codes
    /// from the prior set that were still unconsumed at the moment
    /// `consumed_code_id` was redeemed (`None` if it had already been
    /// redeemed by someone else, in which case nothing was written).
    async fn consume_and_rotate(
        &self,
        user_id: UserId,
        consumed_code_id: BackupCodeId,
        new_totp_secret: Vec<u8>,
        new_backup_code_hashes: Vec<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<usize>>;
}

/// Orchestrates the backup-code recovery sequence (spec §4.7): a single
/// valid backup code rotates the user's entire second factor and purges
/// every session.
#[derive(Clone)]
pub struct RecoveryProtocolService {
    user_repository: Arc<dyn UserRepository>,
    backup_code_vault: BackupCodeVault,
    totp_provider: Arc<dyn TotpProvider>,
    transaction: Arc<dyn BackupCodeRecoveryTransaction>,
}

impl RecoveryProtocolService {
    /// Creates a new service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        backup_code_vault: BackupCodeVault,
        totp_provider: Arc<dyn TotpProvider>,
        transaction: Arc<dyn BackupCodeRecoveryTransaction>,
    ) -> Self {
        Self {
            user_repository,
            backup_code_vault,
            totp_provider,
            transaction,
        }
    }

    /// Runs the full sequence. On any failure this returns the single
    /// opaque [`AppError::Authentication`] mandated for this endpoint,
    /// regardless of whether the username was unknown, the code was wrong,
    /// or a concurrent caller redeemed the same code first — the code's
    /// consumption and the second-factor rotation happen in one storage
    /// transaction, so there is no window in which a code is burned without
    /// a rotation having happened.
    pub async fn recover_with_backup_code(
        &self,
        username: &Username,
        candidate_code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BackupCodeRecoveryOutcome> {
        let Some(user) = self.user_repository.find_by_username(username).await? else {
            self.backup_code_vault.decoy_verify();
            return Err(AppError::Authentication);
        };

        let Some(consumed_code_id) = self
            .backup_code_vault
            .find_unused_matching_code(user.id, candidate_code)
            .await?
        else {
            return Err(AppError::Authentication);
        };

        let (new_secret, totp_enrollment) = self.totp_provider.generate_secret(username.as_str())?;
        let (new_backup_codes, new_backup_code_hashes) = self.backup_code_vault.generate_hashed_codes()?;

        let Some(remaining_old_codes) = self
            .transaction
            .consume_and_rotate(user.id, consumed_code_id, new_secret, new_backup_code_hashes, now)
            .await?
        else {
            return Err(AppError::Authentication);
        };

        Ok(BackupCodeRecoveryOutcome {
            totp_enrollment,
            new_backup_codes,
            remaining_old_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use shelfguard_domain::{AuthType, BackupCode, User};

    use super::*;
    use crate::backup_code_vault::{BackupCodeHasher, BackupCodeRepository};

    struct FixedUser(User);

    #[async_trait]
    impl UserRepository for FixedUser {
        async fn find_by_username(&self, username: &Username) -> AppResult<Option<User>> {
            Ok((self.0.username == *username).then(|| self.0.clone()))
        }

        async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
            Ok((self.0.id == user_id).then(|| self.0.clone()))
        }

        async fn username_exists(&self, _username: &Username) -> AppResult<bool> {
            Ok(true)
        }

        async fn create(
            &self,
            _username: &Username,
            _auth_type: AuthType,
            _auth_credential: Vec<u8>,
            _recovery_email: Option<String>,
            _recovery_phone: Option<String>,
            _now: DateTime<Utc>,
        ) -> AppResult<Option<User>> {
            Ok(None)
        }

        async fn save(&self, _user: &User) -> AppResult<()> {
            Ok(())
        }

        async fn update_last_login(&self, _user_id: UserId, _now: DateTime<Utc>) -> AppResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryBackupCodes {
        codes: Mutex<Vec<BackupCode>>,
    }

    #[async_trait]
    impl BackupCodeRepository for InMemoryBackupCodes {
        async fn replace_active_codes(&self, _user_id: UserId, _hashes: Vec<String>, _now: DateTime<Utc>) -> AppResult<()> {
            Ok(())
        }

        async fn active_codes(&self, user_id: UserId) -> AppResult<Vec<BackupCode>> {
            let codes = self.codes.lock().unwrap_or_else(|poison| poison.into_inner());
            Ok(codes.iter().filter(|code| code.user_id == user_id && code.is_active()).cloned().collect())
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

    /// A fake transaction that can be told to pretend the code was already
    /// consumed by a concurrent caller, without ever touching `codes`.
    struct FakeTransaction {
        codes: Arc<InMemoryBackupCodes>,
        already_consumed: bool,
    }

    #[async_trait]
    impl BackupCodeRecoveryTransaction for FakeTransaction {
        async fn consume_and_rotate(
            &self,
            user_id: UserId,
            consumed_code_id: BackupCodeId,
            _new_totp_secret: Vec<u8>,
            _new_backup_code_hashes: Vec<String>,
            now: DateTime<Utc>,
        ) -> AppResult<Option<usize>> {
            if self.already_consumed {
                return Ok(None);
            }
            if !self.codes.consume_if_unused(consumed_code_id, now).await? {
                return Ok(None);
            }
            Ok(Some(self.codes.remaining_count(user_id).await?))
        }
    }

    fn user() -> User {
        User {
            id: UserId(1),
            username: Username::parse("recoveruser").unwrap_or_else(|_| unreachable!()),
            auth_type: AuthType::Totp,
            auth_credential: vec![0; 20],
            can_download: false,
            is_admin: false,
            recovery_email: None,
            recovery_phone: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    fn codes_with_one_active(user_id: UserId) -> Arc<InMemoryBackupCodes> {
        Arc::new(InMemoryBackupCodes {
            codes: Mutex::new(vec![BackupCode {
                id: BackupCodeId(1),
                user_id,
                code_hash: "hash:CODE1".to_owned(),
                used_at: None,
            }]),
        })
    }

    #[tokio::test]
    async fn a_race_that_consumes_the_code_first_leaves_no_rotation() {
        let account = user();
        let codes = codes_with_one_active(account.id);
        let service = RecoveryProtocolService::new(
            Arc::new(FixedUser(account.clone())),
            BackupCodeVault::new(codes.clone(), Arc::new(PassthroughHasher)),
            Arc::new(FixedTotpProvider),
            Arc::new(FakeTransaction { codes: codes.clone(), already_consumed: true }),
        );

        let result = service.recover_with_backup_code(&account.username, "CODE1", Utc::now()).await;

        assert!(matches!(result, Err(AppError::Authentication)));
        let remaining = codes.remaining_count(account.id).await.unwrap_or_else(|_| unreachable!());
        assert_eq!(remaining, 1, "the code must not be burned when rotation never happened");
    }

    #[tokio::test]
    async fn a_valid_code_rotates_and_reports_the_remaining_count() {
        let account = user();
        let codes = codes_with_one_active(account.id);
        let service = RecoveryProtocolService::new(
            Arc::new(FixedUser(account.clone())),
            BackupCodeVault::new(codes.clone(), Arc::new(PassthroughHasher)),
            Arc::new(FixedTotpProvider),
            Arc::new(FakeTransaction { codes: codes.clone(), already_consumed: false }),
        );

        let outcome = service
            .recover_with_backup_code(&account.username, "CODE1", Utc::now())
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(outcome.remaining_old_codes, 0);
        assert_eq!(outcome.new_backup_codes.len(), shelfguard_domain::N_BACKUP_CODES);
    }
}
