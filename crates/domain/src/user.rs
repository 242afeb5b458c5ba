use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfguard_core::{AppError, AppResult};

/// Minimum length of a username, in bytes.
pub const USERNAME_MIN_LEN: usize = 5;
/// Maximum length of a username, in bytes.
pub const USERNAME_MAX_LEN: usize = 16;

/// Surrogate integer identifier for a [`User`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// Returns the raw integer value.
    #[must_use]
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, case-sensitive username: 5-16 printable ASCII characters.
///
/// Uniqueness is enforced by the store, not by this type; this type only
/// guarantees shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validates and wraps a raw username.
    ///
    /// # Errors
    /// Returns [`AppError::Input`] if the length is out of range or any byte
    /// is not printable ASCII.
    pub fn parse(raw: impl Into<String>) -> AppResult<Self> {
        let raw = raw.into();
        let len = raw.len();
        if len < USERNAME_MIN_LEN || len > USERNAME_MAX_LEN {
            return Err(AppError::Input(format!(
                "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
            )));
        }
        if !raw.bytes().all(|byte| byte.is_ascii_graphic()) {
            return Err(AppError::Input(
                "username must contain only printable ASCII characters".to_owned(),
            ));
        }
        Ok(Self(raw))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Username {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a user's second factor is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthType {
    /// RFC 6238 time-based one-time password.
    Totp,
    /// WebAuthn/FIDO2 public-key credential.
    ///
    /// Reserved per the data model so that adding WebAuthn-based
    /// registration later does not require a schema migration; the
    /// registration endpoint only accepts `"totp"` today.
    Webauthn,
}

impl AuthType {
    /// Returns the wire representation used in request/response bodies.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Webauthn => "webauthn",
        }
    }
}

/// A registered user account.
///
/// `auth_credential` holds the raw TOTP secret when `auth_type == Totp`; it
/// is unused when `auth_type == Webauthn` (credentials live in
/// [`crate::WebAuthnCredential`] rows instead). `recovery_enabled` is
/// intentionally not a stored field — it is derived from the two recovery
/// contact fields so it can never drift out of sync with them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Surrogate primary key.
    pub id: UserId,
    /// Unique, case-sensitive username.
    pub username: Username,
    /// Which second-factor mechanism this user authenticates with.
    pub auth_type: AuthType,
    /// Raw TOTP secret bytes when `auth_type == Totp`.
    #[serde(skip_serializing)]
    pub auth_credential: Vec<u8>,
    /// Whether the user may download protected content.
    pub can_download: bool,
    /// Whether the user has administrative privileges.
    pub is_admin: bool,
    /// Optional recovery email address, used by the magic-link protocol.
    pub recovery_email: Option<String>,
    /// Optional recovery phone number.
    pub recovery_phone: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the user last completed a login, if ever.
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Whether this user has any recovery contact on file.
    #[must_use]
    pub fn recovery_enabled(&self) -> bool {
        self.recovery_email.is_some() || self.recovery_phone.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rejects_too_short() {
        assert!(Username::parse("abcd").is_err());
    }

    #[test]
    fn username_rejects_too_long() {
        assert!(Username::parse("a".repeat(17)).is_err());
    }

    #[test]
    fn username_rejects_non_ascii() {
        assert!(Username::parse("caf\u{e9}12").is_err());
    }

    #[test]
    fn username_accepts_valid_shape() {
        assert!(Username::parse("testuser1").is_ok());
    }

    #[test]
    fn recovery_enabled_reflects_contact_fields() {
        let mut user = User {
            id: UserId(1),
            username: Username::parse("testuser1").unwrap_or_else(|_| unreachable!()),
            auth_type: AuthType::Totp,
            auth_credential: vec![],
            can_download: false,
            is_admin: false,
            recovery_email: None,
            recovery_phone: None,
            created_at: Utc::now(),
            last_login: None,
        };
        assert!(!user.recovery_enabled());
        user.recovery_email = Some("user@example.com".to_owned());
        assert!(user.recovery_enabled());
    }
}
