//! Login, logout, session introspection, registration and magic-link
//! handlers.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum_extra::extract::CookieJar;
use shelfguard_application::{MAGIC_LINK_GENERIC_MESSAGE, RateLimitRule};
use shelfguard_core::AppError;
use shelfguard_domain::Username;

use crate::cookies::{build_expired_cookie, build_session_cookie};
use crate::dto::{
    CheckResponse, LoginRequest, LoginResponse, MagicLinkRequest, MagicLinkResponse,
    MagicLinkVerifyRequest, MagicLinkVerifyResponse, MeResponse, NotificationResponse,
    RegisterStartRequest, RegisterStartResponse, RegisterVerifyRequest, RegisterVerifyResponse,
    SessionResponse, UserResponse,
};
use crate::error::ApiResult;
use crate::handlers::support::client_ip_string;
use crate::middleware::CurrentUser;
use crate::state::AppState;

const LOGIN_RULE: RateLimitRule = RateLimitRule::new(10, 900);
const MAGIC_LINK_RULE: RateLimitRule = RateLimitRule::new(5, 3600);
const REGISTER_START_RULE: RateLimitRule = RateLimitRule::new(5, 3600);

/// Decoy secret used to run a TOTP verification with the same cost as a
/// real one when the username is unknown, so the two paths take
/// indistinguishable time.
const DECOY_SECRET: [u8; 20] = [0u8; 20];

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    let ip = client_ip_string(&headers);
    let now = state.clock.now();
    let within_limit = state.rate_limit_service.record_attempt(&format!("login:{ip}"), LOGIN_RULE, now)?;
    if !within_limit {
        return Err(AppError::Forbidden("too many login attempts".to_owned()).into());
    }

    let username = Username::parse(payload.username)?;

    let Some(user) = state.user_directory.get_by_username(&username).await? else {
        let _ = state.totp_provider.verify_code(&DECOY_SECRET, &payload.code);
        return Err(AppError::Authentication.into());
    };

    if !state.totp_provider.verify_code(&user.auth_credential, &payload.code)? {
        return Err(AppError::Authentication.into());
    }

    state.user_directory.update_last_login(user.id, now).await?;
    let (_session, raw_token) = state.session_manager.create_for_user(user.id, None, Some(ip)).await?;

    let jar = jar.add(build_session_cookie(raw_token, &state.config, false));
    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            user: UserResponse::from(&user),
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    current_user: Option<Extension<CurrentUser>>,
) -> ApiResult<(CookieJar, StatusCode)> {
    if let Some(Extension(current)) = current_user {
        state.session_manager.invalidate(current.session.id).await?;
    }
    Ok((jar.add(build_expired_cookie(&state.config)), StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<MeResponse>> {
    let notifications = state.notification_service.active_for_user(current.user.id).await?;
    Ok(Json(MeResponse {
        user: UserResponse::from(&current.user),
        session: SessionResponse::from(&current.session),
        notifications: notifications.iter().map(NotificationResponse::from).collect(),
    }))
}

pub async fn check(current_user: Option<Extension<CurrentUser>>) -> Json<CheckResponse> {
    match current_user {
        Some(Extension(current)) => Json(CheckResponse {
            authenticated: true,
            username: Some(current.user.username.as_str().to_owned()),
            is_admin: Some(current.user.is_admin),
        }),
        None => Json(CheckResponse {
            authenticated: false,
            username: None,
            is_admin: None,
        }),
    }
}

pub async fn register_start(
    State(state): State<AppState>,
    Json(payload): Json<RegisterStartRequest>,
) -> ApiResult<Json<RegisterStartResponse>> {
    let now = state.clock.now();
    let within_limit = state
        .rate_limit_service
        .record_attempt("register-start", REGISTER_START_RULE, now)?;
    if !within_limit {
        return Err(AppError::Forbidden("too many registration attempts".to_owned()).into());
    }

    let username = Username::parse(payload.username)?;
    if state.user_directory.username_exists(&username).await? {
        return Err(AppError::Input("username is already taken".to_owned()).into());
    }

    let (_pending, raw_token) = state.pending_registration_service.start(&username).await?;

    Ok(Json(RegisterStartResponse {
        verify_token: state.config.dev_mode.then_some(raw_token),
    }))
}

pub async fn register_verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterVerifyRequest>,
) -> ApiResult<(CookieJar, Json<RegisterVerifyResponse>)> {
    if payload.auth_type != "totp" {
        return Err(AppError::Input("auth_type must be 'totp'".to_owned()).into());
    }

    let pending = state.pending_registration_service.verify(&payload.token).await?;
    let username = Username::parse(pending.username)?;

    let outcome = state
        .registration_service
        .complete_totp_registration(&username, payload.recovery_email, payload.recovery_phone)
        .await?;

    let qr_code = if payload.include_qr {
        Some(
            state
                .totp_provider
                .qr_code_data_uri(&outcome.user.auth_credential, username.as_str())?,
        )
    } else {
        None
    };

    let (_session, raw_token) = state
        .session_manager
        .create_for_user(outcome.user.id, None, None)
        .await?;
    let jar = jar.add(build_session_cookie(raw_token, &state.config, false));

    Ok((
        jar,
        Json(RegisterVerifyResponse {
            username: username.as_str().to_owned(),
            totp_secret: outcome.totp_enrollment.secret_base32,
            otpauth_uri: outcome.totp_enrollment.otpauth_uri,
            qr_code,
            backup_codes: outcome.backup_codes,
        }),
    ))
}

pub async fn magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MagicLinkRequest>,
) -> ApiResult<Json<MagicLinkResponse>> {
    let ip = client_ip_string(&headers);
    let now = state.clock.now();
    let within_limit = state
        .rate_limit_service
        .record_attempt(&format!("magic-link:{ip}"), MAGIC_LINK_RULE, now)?;

    if within_limit {
        let username = Username::parse(payload.username)?;
        state.pending_recovery_service.request_magic_link(&username).await?;
    }

    Ok(Json(MagicLinkResponse {
        message: MAGIC_LINK_GENERIC_MESSAGE.to_owned(),
    }))
}

pub async fn magic_link_verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<MagicLinkVerifyRequest>,
) -> ApiResult<(CookieJar, Json<MagicLinkVerifyResponse>)> {
    let user_id = state.pending_recovery_service.verify(&payload.token).await?;
    let Some(user) = state.user_directory.get_by_id(user_id).await? else {
        return Err(AppError::Authentication.into());
    };

    let now = state.clock.now();
    state.user_directory.update_last_login(user.id, now).await?;
    let (_session, raw_token) = state.session_manager.create_for_user(user.id, None, None).await?;
    let jar = jar.add(build_session_cookie(raw_token, &state.config, true));

    Ok((
        jar,
        Json(MagicLinkVerifyResponse {
            success: true,
            user: UserResponse::from(&user),
        }),
    ))
}
