//! Liveness and store-connectivity probe.

use axum::Json;
use axum::extract::State;

use crate::dto::HealthResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    // `verify()` never errors; a failed probe is reported as `reachable: false`
    // with `error` set, not propagated as a 500.
    let report = state.store.verify().await?;
    Ok(Json(HealthResponse {
        can_connect: report.reachable,
        schema_version: report.schema_version,
        user_count: report.user_count,
        error: report.error,
    }))
}
