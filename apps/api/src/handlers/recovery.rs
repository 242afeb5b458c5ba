//! Backup-code recovery, code management, and recovery-contact handlers.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use shelfguard_application::RateLimitRule;
use shelfguard_core::AppError;
use shelfguard_domain::Username;

use crate::dto::{
    RecoverBackupCodeRequest, RecoverBackupCodeResponse, RegenerateCodesResponse,
    RemainingCodesResponse, UpdateContactRequest, UpdateContactResponse,
};
use crate::error::ApiResult;
use crate::handlers::support::client_ip_string;
use crate::middleware::CurrentUser;
use crate::state::AppState;

const BACKUP_CODE_RULE: RateLimitRule = RateLimitRule::new(5, 900);

pub async fn recover_backup_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RecoverBackupCodeRequest>,
) -> ApiResult<Json<RecoverBackupCodeResponse>> {
    let ip = client_ip_string(&headers);
    let now = state.clock.now();
    let within_limit = state
        .rate_limit_service
        .record_attempt(&format!("backup-code:{ip}"), BACKUP_CODE_RULE, now)?;
    if !within_limit {
        return Err(AppError::Authentication.into());
    }

    let username = Username::parse(payload.username)?;
    let outcome = state
        .recovery_protocol_service
        .recover_with_backup_code(&username, &payload.backup_code, now)
        .await?;

    Ok(Json(RecoverBackupCodeResponse {
        totp_secret: outcome.totp_enrollment.secret_base32,
        otpauth_uri: outcome.totp_enrollment.otpauth_uri,
        backup_codes: outcome.new_backup_codes,
        remaining_old_codes: outcome.remaining_old_codes,
    }))
}

pub async fn remaining_codes(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<RemainingCodesResponse>> {
    let remaining = state.backup_code_vault.remaining_count(current.user.id).await?;
    Ok(Json(RemainingCodesResponse { remaining }))
}

pub async fn regenerate_codes(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<RegenerateCodesResponse>> {
    let now = state.clock.now();
    let backup_codes = state.backup_code_vault.create_codes_for_user(current.user.id, now).await?;
    Ok(Json(RegenerateCodesResponse { backup_codes }))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpdateContactRequest>,
) -> ApiResult<Json<UpdateContactResponse>> {
    let mut user = current.user;
    user.recovery_email = payload.recovery_email;
    user.recovery_phone = payload.recovery_phone;
    state.user_directory.save(&user).await?;

    Ok(Json(UpdateContactResponse {
        recovery_enabled: user.recovery_enabled(),
    }))
}
