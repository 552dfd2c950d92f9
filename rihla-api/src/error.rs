use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rihla_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError { kind: &'static str, message: String },
    PaymentRequired(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::ConflictError { kind, message } => (StatusCode::CONFLICT, kind, message),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, "settlement_failure", msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let kind = err.kind();
        match err {
            CoreError::Validation(msg) => AppError::ValidationError(msg),
            CoreError::Forbidden(msg) => AppError::AuthorizationError(msg),
            CoreError::NotFound { .. } => AppError::NotFoundError(message),
            CoreError::InsufficientCapacity { .. } | CoreError::InvalidTransition { .. } => {
                AppError::ConflictError { kind, message }
            }
            CoreError::SettlementFailure(_) => AppError::PaymentRequired(message),
            CoreError::InvariantViolation(_) | CoreError::Internal(_) => AppError::InternalServerError(message),
        }
    }
}
