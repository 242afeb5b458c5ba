//! Request and response bodies for the `/auth` HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfguard_domain::{Notification, Session, User};

/// Public-facing projection of [`User`]: never serializes `auth_credential`.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub auth_type: &'static str,
    pub can_download: bool,
    pub is_admin: bool,
    pub recovery_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.value(),
            username: user.username.as_str().to_owned(),
            auth_type: user.auth_type.as_str(),
            can_download: user.can_download,
            is_admin: user.is_admin,
            recovery_enabled: user.recovery_enabled(),
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            created_at: session.created_at,
            last_seen: session.last_seen,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub message: String,
    pub notification_type: String,
    pub priority: i32,
    pub dismissable: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationResponse {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id.0,
            message: notification.message.clone(),
            notification_type: notification.notification_type.clone(),
            priority: notification.priority,
            dismissable: notification.dismissable,
            created_at: notification.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub session: SessionResponse,
    pub notifications: Vec<NotificationResponse>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterStartRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterStartResponse {
    /// Populated only in dev mode; delivered out-of-band otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterVerifyRequest {
    pub token: String,
    pub auth_type: String,
    #[serde(default)]
    pub recovery_email: Option<String>,
    #[serde(default)]
    pub recovery_phone: Option<String>,
    #[serde(default)]
    pub include_qr: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterVerifyResponse {
    pub username: String,
    pub totp_secret: String,
    pub otpauth_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecoverBackupCodeRequest {
    pub username: String,
    pub backup_code: String,
}

#[derive(Debug, Serialize)]
pub struct RecoverBackupCodeResponse {
    pub totp_secret: String,
    pub otpauth_uri: String,
    pub backup_codes: Vec<String>,
    pub remaining_old_codes: usize,
}

#[derive(Debug, Serialize)]
pub struct RemainingCodesResponse {
    pub remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct RegenerateCodesResponse {
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    #[serde(default)]
    pub recovery_email: Option<String>,
    #[serde(default)]
    pub recovery_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateContactResponse {
    pub recovery_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MagicLinkVerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MagicLinkVerifyResponse {
    pub success: bool,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub can_connect: bool,
    pub schema_version: i64,
    pub user_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
