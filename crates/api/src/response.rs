//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acknowledgement for a tracked event.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    pub event_id: Uuid,
    /// True when this delivery repeated an already-recorded event id
    /// and therefore produced no new increments.
    pub deduplicated: bool,
    pub timestamp: i64,
}

impl TrackResponse {
    pub fn accepted(event_id: Uuid) -> Self {
        Self {
            success: true,
            event_id,
            deduplicated: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn duplicate(event_id: Uuid) -> Self {
        Self {
            deduplicated: true,
            ..Self::accepted(event_id)
        }
    }
}

/// Acknowledgement for a direct aggregate write.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub timestamp: i64,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub workers_healthy: bool,
    pub open_sessions: u64,
    pub outbox_depth: u64,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error carrying the engine taxonomy's status mapping.
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse {
                error: msg.into(),
                code: code.into(),
            },
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<engine_core::Error> for ApiError {
    fn from(err: engine_core::Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &err {
            engine_core::Error::Validation(_) => "VALIDATION",
            engine_core::Error::MissingField(_) => "MISSING_FIELD",
            engine_core::Error::InvalidTenant(_) => "INVALID_TENANT",
            engine_core::Error::Serialization(_) => "MALFORMED_BODY",
            engine_core::Error::UnknownFunnel(_) => "UNKNOWN_FUNNEL",
            engine_core::Error::TransientConflict(_) => "WRITE_CONFLICT",
            engine_core::Error::Persistence(_) => "PERSISTENCE",
            engine_core::Error::ClientTransport(_) => "TRANSPORT",
            engine_core::Error::Internal(_) => "INTERNAL",
        };
        ApiError::new(status, code, err.to_string())
    }
}
