use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shelfguard_core::AppError;
use tracing::error;

/// Gateway-side wrapper around [`AppError`]: the only site permitted to
/// translate the service-layer error taxonomy into an HTTP status and body.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::Input(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Authentication => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, message.clone()),
            AppError::HiddenNotFound => (StatusCode::NOT_FOUND, "not found".to_owned()),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
            AppError::CloneSuspected => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            AppError::Store(detail) => {
                error!(detail, "internal store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Standard handler result type.
pub type ApiResult<T> = Result<T, ApiError>;
