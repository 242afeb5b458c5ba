//! HTTP route table.

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use shelfguard_core::{AppError, AppResult};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, health, notifications, recovery};
use crate::middleware::{login_required_if_enabled, resolve_session};
use crate::state::AppState;

/// Builds the full router: public routes first, then the handful gated on
/// [`login_required_if_enabled`], with [`resolve_session`] applied globally
/// so every handler can read an optional [`crate::middleware::CurrentUser`]
/// extension regardless of which group it lives in.
pub fn build_router(app_state: AppState) -> AppResult<Router> {
    let login_gated_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/recover/remaining-codes", post(recovery::remaining_codes))
        .route("/recover/regenerate-codes", post(recovery::regenerate_codes))
        .route("/recover/update-contact", post(recovery::update_contact))
        .route("/notifications/dismiss/{id}", post(notifications::dismiss))
        .route_layer(from_fn_with_state(app_state.clone(), login_required_if_enabled));

    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/check", get(auth::check))
        .route("/register/start", post(auth::register_start))
        .route("/register/verify", post(auth::register_verify))
        .route("/recover/backup-code", post(recovery::recover_backup_code))
        .route("/magic-link", post(auth::magic_link))
        .route("/magic-link/verify", post(auth::magic_link_verify))
        .route("/health", get(health::health));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&app_state.config.cors_origin)
                .map_err(|error| AppError::Input(format!("invalid SHELFGUARD_CORS_ORIGIN: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Ok(Router::new()
        .merge(public_routes)
        .merge(login_gated_routes)
        .route_layer(from_fn_with_state(app_state.clone(), resolve_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state))
}
