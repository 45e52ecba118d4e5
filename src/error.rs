//! Gateway error types with HTTP status and WebSocket close code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code, a structured JSON error response,
//! and the close code used when a WebSocket handshake fails.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ConnectionId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid credential: token expired",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                  |
/// |-----------|-------------------|------------------------------|
/// | 1000–1999 | Authentication    | 401 / 403 / 400              |
/// | 2000–2999 | Connection state  | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server            | 500 / 503 / 408              |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Token missing, malformed, expired, or signed with another key.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Token is valid but no user matches its email.
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    /// The user directory could not be reached. Retryable on reconnect.
    #[error("identity lookup unavailable: {0}")]
    LookupUnavailable(String),

    /// Authentication did not finish within the configured timeout.
    #[error("authentication timed out")]
    AuthTimeout,

    /// Authenticated caller lacks the required role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No registered connection with the given id.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The transport closed before the handshake completed.
    #[error("connection {0} closed during handshake")]
    ConnectionClosed(ConnectionId),

    /// A connection with the same id is already known to the registry.
    #[error("connection {0} already registered")]
    DuplicateConnection(ConnectionId),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidCredential(_) => 1001,
            Self::UnknownIdentity(_) => 1002,
            Self::Forbidden(_) => 1003,
            Self::InvalidRequest(_) => 1004,
            Self::ConnectionNotFound(_) => 2001,
            Self::ConnectionClosed(_) => 2002,
            Self::DuplicateConnection(_) => 2003,
            Self::Internal(_) => 3000,
            Self::LookupUnavailable(_) => 3001,
            Self::AuthTimeout => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredential(_) | Self::UnknownIdentity(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionClosed(_) | Self::DuplicateConnection(_) => StatusCode::CONFLICT,
            Self::LookupUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::AuthTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the WebSocket close code sent when a handshake fails.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            Self::InvalidCredential(_) | Self::UnknownIdentity(_) => 4401,
            Self::Forbidden(_) => 4403,
            Self::AuthTimeout => 4408,
            Self::ConnectionClosed(_) | Self::DuplicateConnection(_) => 4409,
            // 1013: Try Again Later
            Self::LookupUnavailable(_) => 1013,
            Self::InvalidRequest(_) => 1008,
            Self::ConnectionNotFound(_) | Self::Internal(_) => 1011,
        }
    }

    /// Returns `true` if a client may retry with a fresh connection attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LookupUnavailable(_) | Self::AuthTimeout)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
