//! Session cookie construction.

use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::ApiConfig;
use crate::middleware::SESSION_COOKIE_NAME;

/// Builds the session cookie for a freshly issued session.
///
/// `persistent` is set for sessions created via the magic-link protocol,
/// which carry a one-year max-age rather than expiring with the browser
/// session, matching the longer-lived trust an emailed link implies.
pub fn build_session_cookie(raw_token: String, config: &ApiConfig, persistent: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE_NAME, raw_token))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .build();

    if persistent {
        cookie.set_max_age(Some(time::Duration::days(365)));
    }

    cookie
}

/// Builds the cookie used to clear a session on logout: same identity
/// attributes, empty value, immediately expired.
pub fn build_expired_cookie(config: &ApiConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .build();
    cookie.set_max_age(Some(time::Duration::ZERO));
    cookie
}
