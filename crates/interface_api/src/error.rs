//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain_reimbursement::ReimbursementError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Part of the update was discarded; `details` lists the offending keys
    #[error("Update partially rejected: {message}")]
    Rejected {
        message: String,
        details: Vec<String>,
    },
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg, None)
            }
            ApiError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, None)
            }
            ApiError::Rejected { message, details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "nested_update_rejected",
                message,
                Some(details),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ReimbursementError> for ApiError {
    fn from(err: ReimbursementError) -> Self {
        match err {
            ReimbursementError::TransitionNotAllowed { .. } => ApiError::Conflict(err.to_string()),
            ReimbursementError::NestedUpdateRejected(rejection) => ApiError::Rejected {
                message: format!(
                    "Request changes were discarded, other changes were saved: {}",
                    rejection
                ),
                details: rejection.offending_keys(),
            },
            ReimbursementError::InvariantViolation(msg) => ApiError::Internal(msg),
            ReimbursementError::ProtectedAttribute(key) => {
                ApiError::BadRequest(format!("Attribute is not writable: {}", key))
            }
            ReimbursementError::MalformedPayload(msg) => ApiError::BadRequest(msg),
            ReimbursementError::NotEditable { .. }
            | ReimbursementError::NoEditingRole(_)
            | ReimbursementError::EventNotPermitted { .. } => ApiError::Forbidden(err.to_string()),
            ReimbursementError::NotFound(msg) => ApiError::NotFound(msg),
            ReimbursementError::Conflict(msg) => ApiError::Conflict(msg),
            ReimbursementError::Money(e) => ApiError::Validation(e.to_string()),
            ReimbursementError::Port(e) if e.is_transient() => ApiError::Unavailable(e.to_string()),
            ReimbursementError::Port(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(_) => ApiError::Forbidden(err.to_string()),
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::InvalidSubject(_) => {
                ApiError::Unauthorized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_reimbursement::{ReimbursementEvent, ReimbursementState};

    #[test]
    fn test_transition_not_allowed_is_conflict() {
        let err = ApiError::from(ReimbursementError::TransitionNotAllowed {
            event: ReimbursementEvent::Authorize,
            state: ReimbursementState::TspPending,
        });
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_event_not_permitted_is_forbidden() {
        let err = ApiError::from(ReimbursementError::EventNotPermitted {
            event: ReimbursementEvent::Approve,
            state: ReimbursementState::TspPending,
        });
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_money_overflow_is_unprocessable() {
        let err = ApiError::from(ReimbursementError::Money(core_kernel::MoneyError::Overflow(
            "sum".to_string(),
        )));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_invariant_violation_is_internal() {
        let err = ApiError::from(ReimbursementError::InvariantViolation("gone".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
