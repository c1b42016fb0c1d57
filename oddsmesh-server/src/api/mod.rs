//! HTTP handlers. Thin by design: parse, call the service, map the error
//! taxonomy onto status codes.

pub mod extractors;
pub mod markets;
pub mod orders;
pub mod sync;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oddsmesh_core::processors::order_service::OrderError;
use oddsmesh_core::processors::sync::SyncError;

/// The one error type handlers return; wraps the service taxonomy.
#[derive(Debug)]
pub struct ApiError(pub OrderError);

impl From<OrderError> for ApiError {
    fn from(value: OrderError) -> Self {
        Self(value)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        Self(OrderError::Database(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            OrderError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            OrderError::AlreadyPlaced => (
                StatusCode::CONFLICT,
                "contract order already placed".to_string(),
            ),
            OrderError::AlreadyRefunded => (
                StatusCode::CONFLICT,
                "contract order already refunded".to_string(),
            ),
            OrderError::ConflictState(msg) => (StatusCode::CONFLICT, msg.clone()),
            OrderError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            OrderError::SignatureInvalid(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            OrderError::Venue(e) => {
                tracing::error!(error = %e, "venue error");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            OrderError::Chain(e) => {
                tracing::error!(error = %e, "chain error");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            OrderError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Sync errors get their own mapping (operator endpoint only).
pub struct SyncApiError(pub SyncError);

impl From<SyncError> for SyncApiError {
    fn from(value: SyncError) -> Self {
        Self(value)
    }
}

impl IntoResponse for SyncApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            SyncError::VenueNotFound(v) => {
                (StatusCode::NOT_FOUND, format!("venue {v} is not registered"))
            }
            SyncError::VenueDisabled(v) => {
                (StatusCode::CONFLICT, format!("venue {v} is disabled"))
            }
            SyncError::NoAdapter(v) => {
                (StatusCode::NOT_FOUND, format!("no adapter for venue {v}"))
            }
            SyncError::Venue(e) => {
                tracing::error!(error = %e, "sync venue error");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            SyncError::Database(e) => {
                tracing::error!(error = %e, "sync database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            SyncError::Consumer(e) => {
                tracing::error!(error = %e, "sync consumer failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
