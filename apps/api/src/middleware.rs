//! Session resolution and the five guard predicates from the gateway design:
//! `localhost_only`, `login_required`, `admin_required`,
//! `download_permission_required`, and their `*_if_enabled` variants.
//!
//! A session-resolution middleware runs first on every request and
//! populates a request-scoped [`CurrentUser`] extension; the guards below
//! only ever read that slot, never the cookie jar directly.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use ipnet::IpNet;
use shelfguard_core::AppError;
use shelfguard_domain::{Session, User};
use std::net::SocketAddr;

use crate::error::ApiResult;
use crate::state::AppState;

/// Name of the session cookie, fixed for compatibility with existing
/// frontends.
pub const SESSION_COOKIE_NAME: &str = "audiobooks_session";

/// The authenticated user and session for the current request, inserted by
/// [`resolve_session`]. Absent means the request carried no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

/// Runs first on every request: resolves the session cookie to a live
/// session and user, touches `last_seen`, and stores both in the request's
/// extensions. Never itself rejects a request — that is the guards' job.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        if let Ok(Some(session)) = state.session_manager.get_by_token(cookie.value()).await {
            if let Ok(Some(user)) = state.user_directory.get_by_id(session.user_id).await {
                let _ = state.session_manager.touch(&session).await;
                request.extensions_mut().insert(CurrentUser { user, session });
            }
        }
    }

    next.run(request).await
}

/// Rejects unless [`resolve_session`] found a valid session.
pub async fn login_required(request: Request, next: Next) -> ApiResult<Response> {
    if request.extensions().get::<CurrentUser>().is_none() {
        return Err(AppError::Authentication.into());
    }
    Ok(next.run(request).await)
}

/// As [`login_required`], but passes unconditionally when
/// `config.auth_enabled` is `false` (single-user deployments that bypass
/// this subsystem entirely).
pub async fn login_required_if_enabled(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !state.config.auth_enabled {
        return Ok(next.run(request).await);
    }
    login_required(request, next).await
}

fn is_admin(current: Option<&CurrentUser>) -> bool {
    current.is_some_and(|current| current.user.is_admin)
}

fn can_download(current: Option<&CurrentUser>) -> bool {
    current.is_some_and(|current| current.user.can_download)
}

/// Rejects unless the current user is an administrator. Assumes
/// [`login_required`] (or its `_if_enabled` variant) already ran.
pub async fn admin_required(request: Request, next: Next) -> ApiResult<Response> {
    if !is_admin(request.extensions().get::<CurrentUser>()) {
        return Err(AppError::Forbidden("admin privileges required".to_owned()).into());
    }
    Ok(next.run(request).await)
}

/// As [`admin_required`], conditioned on `config.auth_enabled`.
pub async fn admin_required_if_enabled(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !state.config.auth_enabled {
        return Ok(next.run(request).await);
    }
    admin_required(request, next).await
}

/// Rejects unless the current user may download protected content.
pub async fn download_permission_required(request: Request, next: Next) -> ApiResult<Response> {
    if !can_download(request.extensions().get::<CurrentUser>()) {
        return Err(AppError::Forbidden("download permission required".to_owned()).into());
    }
    Ok(next.run(request).await)
}

/// As [`download_permission_required`], conditioned on `config.auth_enabled`.
pub async fn download_permission_required_if_enabled(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !state.config.auth_enabled {
        return Ok(next.run(request).await);
    }
    download_permission_required(request, next).await
}

static LOOPBACK_NETS: LazyLock<[IpNet; 2]> = LazyLock::new(|| {
    [
        IpNet::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8).unwrap_or_else(|_| unreachable!()),
        IpNet::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 128).unwrap_or_else(|_| unreachable!()),
    ]
});

fn is_loopback(ip: IpAddr) -> bool {
    LOOPBACK_NETS.iter().any(|net| net.contains(&ip))
}

/// Rejects with [`AppError::HiddenNotFound`] (hiding the endpoint's
/// existence, rather than revealing it with a 401/403) unless the request
/// originates from loopback, considering `X-Forwarded-For[0]` if present.
pub async fn localhost_only(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let remote_ip = client_ip(request.headers()).unwrap_or(peer.ip());
    if !is_loopback(remote_ip) {
        return Err(AppError::HiddenNotFound.into());
    }
    Ok(next.run(request).await)
}

/// As [`localhost_only`], conditioned on `config.auth_enabled`.
pub async fn localhost_only_if_enabled(
    State(state): State<AppState>,
    connect_info: ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !state.config.auth_enabled {
        return Ok(next.run(request).await);
    }
    localhost_only(connect_info, request, next).await
}

/// Extracts the client IP from `X-Forwarded-For`'s first entry, for use
/// both by `localhost_only` and by rate-limiting keys.
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .and_then(|candidate| candidate.parse::<IpAddr>().ok())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shelfguard_domain::{AuthType, SessionId, UserId, Username};

    use super::*;

    #[test]
    fn ipv4_loopback_range_is_recognized() {
        assert!(is_loopback(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_loopback(IpAddr::V4(Ipv4Addr::new(127, 33, 4, 9))));
    }

    #[test]
    fn ipv6_loopback_is_recognized() {
        assert!(is_loopback(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn routable_addresses_are_rejected() {
        assert!(!is_loopback(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
    }

    fn current_user(is_admin: bool, can_download: bool) -> CurrentUser {
        let now = Utc::now();
        CurrentUser {
            user: User {
                id: UserId(1),
                username: Username::parse("guarded").unwrap_or_else(|_| unreachable!()),
                auth_type: AuthType::Totp,
                auth_credential: vec![0; 20],
                can_download,
                is_admin,
                recovery_email: None,
                recovery_phone: None,
                created_at: now,
                last_login: None,
            },
            session: Session {
                id: SessionId(1),
                user_id: UserId(1),
                user_agent: None,
                ip_address: None,
                created_at: now,
                last_seen: now,
            },
        }
    }

    #[test]
    fn admin_predicate_requires_the_admin_flag() {
        assert!(is_admin(Some(&current_user(true, false))));
        assert!(!is_admin(Some(&current_user(false, false))));
        assert!(!is_admin(None));
    }

    #[test]
    fn download_predicate_requires_the_can_download_flag() {
        assert!(can_download(Some(&current_user(false, true))));
        assert!(!can_download(Some(&current_user(false, false))));
        assert!(!can_download(None));
    }

    #[test]
    fn client_ip_reads_the_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap_or_else(|_| unreachable!()));
        assert_eq!(client_ip(&headers), Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))));
    }

    #[test]
    fn client_ip_is_absent_without_the_header() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
