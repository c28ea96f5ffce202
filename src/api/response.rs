use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::permissions::Permission;

// ============================================================================
// JSend status enum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

// ============================================================================
// JSend success envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T: Serialize> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }
}

// ============================================================================
// JSend fail envelope (client errors, 4xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendFail {
    pub data: FailData,
    pub status: JSendStatus,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FailData {
    /// Set on 423 responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockout_remaining: Option<i64>,
    pub message: String,
    /// Set on 403 responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<String>,
}

impl JSendFail {
    pub fn response(status_code: StatusCode, data: FailData) -> (StatusCode, Json<JSendFail>) {
        (
            status_code,
            Json(JSendFail {
                data,
                status: JSendStatus::Fail,
            }),
        )
    }
}

// ============================================================================
// JSend error envelope (server errors, 5xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendError {
    pub message: String,
    pub status: JSendStatus,
}

impl JSendError {
    pub fn response(
        status_code: StatusCode,
        message: impl Into<String>,
    ) -> (StatusCode, Json<JSendError>) {
        (
            status_code,
            Json(JSendError {
                message: message.into(),
                status: JSendStatus::Error,
            }),
        )
    }
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

/// A JSend-compatible error that can be either a fail (4xx) or error (5xx).
/// Used as the error type in handler Result returns.
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, FailData),
    Error(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Fail(code, data) => JSendFail::response(code, data).into_response(),
            ApiError::Error(code, msg) => JSendError::response(code, msg).into_response(),
        }
    }
}

impl ApiError {
    fn fail(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Fail(
            status,
            FailData {
                message: message.into(),
                ..Default::default()
            },
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::fail(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::fail(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(permission: Permission) -> Self {
        ApiError::Fail(
            StatusCode::FORBIDDEN,
            FailData {
                message: "You do not have permission to do this".to_string(),
                required_permission: Some(permission.to_string()),
                ..Default::default()
            },
        )
    }

    pub fn locked(remaining_seconds: i64) -> Self {
        ApiError::Fail(
            StatusCode::LOCKED,
            FailData {
                lockout_remaining: Some(remaining_seconds),
                message: format!(
                    "Too many failed attempts. Try again in {remaining_seconds} seconds."
                ),
                ..Default::default()
            },
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::fail(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Fail(code, _) | ApiError::Error(code, _) => *code,
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::AuthenticationRequired => {
                ApiError::unauthorized("PIN authentication required")
            }
            AccessError::AuthenticationExpired => {
                ApiError::unauthorized("Session expired. Please enter your PIN again.")
            }
            AccessError::AuthorizationDenied { permission } => ApiError::forbidden(permission),
            AccessError::LockedOut { remaining_seconds } => ApiError::locked(remaining_seconds),
            AccessError::Validation(message) => ApiError::bad_request(message),
            e @ (AccessError::Persistence(_) | AccessError::Hashing(_)) => {
                tracing::error!(error = %e, "Access operation failed");
                ApiError::internal("Internal server error")
            }
        }
    }
}

// ============================================================================
// Extractors with JSend rejections
// ============================================================================

/// `Json` extractor whose rejection is a JSend fail
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

/// `Query` extractor whose rejection is a JSend fail
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseError;

    #[test]
    fn test_access_errors_map_to_status_codes() {
        let cases = [
            (AccessError::AuthenticationRequired, StatusCode::UNAUTHORIZED),
            (AccessError::AuthenticationExpired, StatusCode::UNAUTHORIZED),
            (
                AccessError::AuthorizationDenied {
                    permission: Permission::PointsAward,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AccessError::LockedOut {
                    remaining_seconds: 60,
                },
                StatusCode::LOCKED,
            ),
            (AccessError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                AccessError::Persistence(DatabaseError::Io(std::io::Error::other("disk"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_forbidden_names_permission() {
        match ApiError::forbidden(Permission::AuditView) {
            ApiError::Fail(_, data) => {
                assert_eq!(data.required_permission.as_deref(), Some("audit:view"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let error = AccessError::Hashing("salt failure".to_string());
        match ApiError::from(error) {
            ApiError::Error(_, message) => assert!(!message.contains("salt")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
