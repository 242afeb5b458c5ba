//! Notification dismissal.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use shelfguard_domain::NotificationId;

use crate::error::ApiResult;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub async fn dismiss(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(notification_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let now = state.clock.now();
    state
        .notification_service
        .dismiss(NotificationId(notification_id), current.user.id, now)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
