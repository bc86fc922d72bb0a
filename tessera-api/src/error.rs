use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tessera_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    GatewayError(String),
    UnavailableError(String),
    InternalServerError(String),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::Conflict(_) | CoreError::LimitExceeded { .. } | CoreError::AlreadyFinal(_) => {
                AppError::ConflictError(err.to_string())
            }
            CoreError::GatewayError(msg) => AppError::GatewayError(msg),
            CoreError::Timeout(_) => AppError::UnavailableError(err.to_string()),
            CoreError::StorageError(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, label, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "fail", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "fail", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "fail", msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, "conflict", msg),
            // Gateway text is passed through untouched
            AppError::GatewayError(msg) => (StatusCode::BAD_GATEWAY, "fail", msg),
            AppError::UnavailableError(msg) => (StatusCode::SERVICE_UNAVAILABLE, "fail", msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "fail",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "status": label,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
