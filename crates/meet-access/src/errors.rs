//! Meeting access error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! for 5xx responses are generic; the underlying cause is logged server-side.

use crate::models::DenyReason;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Meeting access error type.
///
/// Maps to HTTP status codes:
/// - Denied: 400, 403, or 404 depending on the reason
/// - BadRequest: 400
/// - InvalidToken: 401 (with `WWW-Authenticate`)
/// - Forbidden: 403
/// - NotFound: 404
/// - Configuration, SigningFailure, Database, Internal: 500
#[derive(Debug, Error)]
pub enum MeetError {
    #[error("Join denied: {}", .0.code())]
    Denied(DenyReason),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Signing failure: {0}")]
    SigningFailure(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeetError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            MeetError::Denied(reason) => match reason {
                DenyReason::MissingGuestName | DenyReason::MissingRoom => 400,
                DenyReason::GuestsNotAllowed | DenyReason::MeetingDisabled => 403,
                DenyReason::MeetingNotFound => 404,
            },
            MeetError::BadRequest(_) => 400,
            MeetError::InvalidToken(_) => 401,
            MeetError::Forbidden(_) => 403,
            MeetError::NotFound(_) => 404,
            MeetError::Configuration(_)
            | MeetError::SigningFailure(_)
            | MeetError::Database(_)
            | MeetError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for MeetError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let (code, message) = match &self {
            MeetError::Denied(reason) => (reason.code(), reason.message().to_string()),
            MeetError::BadRequest(reason) => ("BAD_REQUEST", reason.clone()),
            MeetError::InvalidToken(reason) => ("INVALID_TOKEN", reason.clone()),
            MeetError::Forbidden(reason) => ("FORBIDDEN", reason.clone()),
            MeetError::NotFound(resource) => ("NOT_FOUND", resource.clone()),
            MeetError::Configuration(detail) => {
                tracing::error!(target: "meet.config", detail = %detail, "Service misconfigured");
                (
                    "CONFIGURATION_ERROR",
                    "Token issuance is not configured".to_string(),
                )
            }
            MeetError::SigningFailure(detail) => {
                tracing::error!(target: "meet.token", detail = %detail, "Token signing failed");
                ("SIGNING_FAILURE", "Failed to generate token".to_string())
            }
            MeetError::Database(err) => {
                tracing::error!(target: "meet.database", error = %err, "Database operation failed");
                (
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            MeetError::Internal(detail) => {
                tracing::error!(target: "meet.internal", detail = %detail, "Internal error");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"meet-access\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

impl From<sqlx::Error> for MeetError {
    fn from(err: sqlx::Error) -> Self {
        MeetError::Database(err.to_string())
    }
}
