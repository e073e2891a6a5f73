/// Error handling for the API server
///
/// Handlers return `Result<T, ApiError>`; every component error converts
/// into it. Authorization failures are deliberately coarse: a missing or
/// expired session is `401`, every other guard denial is the same `403`
/// "Access denied" so responses cannot be used to probe memberships or
/// plans. The precise reason is logged at debug level by the guard chain.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskboard_shared::{
    auth::{password::PasswordError, GuardError},
    board::{ActivityError, OrderingError},
    error::StoreError,
    projects::ProjectError,
    session::SessionError,
};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500); the message is logged, never returned
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    fn access_denied() -> Self {
        ApiError::Forbidden("Access denied".to_string())
    }

    fn unauthenticated() -> Self {
        ApiError::Unauthorized("Authentication required".to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Unauthenticated => ApiError::unauthenticated(),
            GuardError::NoActiveTenant
            | GuardError::NotAMember
            | GuardError::InsufficientRole { .. }
            | GuardError::PlanNotAllowed { .. } => ApiError::access_denied(),
            GuardError::Session(e) => ApiError::InternalError(format!("Session store: {}", e)),
            GuardError::Store(e) => e.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ApiError::unauthenticated(),
            other => ApiError::InternalError(format!("Session store: {}", other)),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => ApiError::Conflict(conflict_message(&constraint)),
            StoreError::Contention(_) => {
                ApiError::Conflict("Request conflicted with a concurrent update, retry".to_string())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

fn conflict_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "Email already registered".to_string(),
        "users_username_key" => "Username already taken".to_string(),
        _ => "Resource already exists".to_string(),
    }
}

impl From<OrderingError> for ApiError {
    fn from(err: OrderingError) -> Self {
        match err {
            OrderingError::TaskNotFound => ApiError::NotFound("Task not found".to_string()),
            OrderingError::InvalidPosition { .. } => ApiError::BadRequest(err.to_string()),
            OrderingError::NotTaskCreator => ApiError::Forbidden(err.to_string()),
            OrderingError::Conflict => ApiError::Conflict(err.to_string()),
            OrderingError::InvariantViolation(detail) => {
                ApiError::InternalError(format!("Board invariant violated: {}", detail))
            }
            OrderingError::Store(e) => e.into(),
        }
    }
}

impl From<ActivityError> for ApiError {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::TaskNotFound | ActivityError::AssigneeNotFound | ActivityError::CommentNotFound => {
                ApiError::NotFound(err.to_string())
            }
            ActivityError::AssigneeNotMember => ApiError::BadRequest(err.to_string()),
            ActivityError::AlreadyAssigned => ApiError::Conflict(err.to_string()),
            ActivityError::NotCommentAuthor => ApiError::Forbidden(err.to_string()),
            ActivityError::Store(e) => e.into(),
        }
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound | ProjectError::MemberNotFound | ProjectError::InvitationNotFound => {
                ApiError::NotFound(err.to_string())
            }
            ProjectError::SelfRoleChange | ProjectError::InvitationEmailMismatch => {
                ApiError::Forbidden(err.to_string())
            }
            ProjectError::LastMember | ProjectError::AlreadyMember => ApiError::Conflict(err.to_string()),
            ProjectError::InvitationExpired => ApiError::BadRequest(err.to_string()),
            ProjectError::Store(e) => e.into(),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert validator errors to a field-by-field 422
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_shared::models::{membership::MemberRole, project::ProjectPlan};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Task not found".to_string());
        assert_eq!(err.to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_guard_denials_are_indistinguishable() {
        let denials = [
            GuardError::NoActiveTenant,
            GuardError::NotAMember,
            GuardError::InsufficientRole {
                actual: MemberRole::Viewer,
            },
            GuardError::PlanNotAllowed {
                plan: ProjectPlan::Free,
            },
        ];

        for denial in denials {
            match ApiError::from(denial) {
                ApiError::Forbidden(message) => assert_eq!(message, "Access denied"),
                other => panic!("expected forbidden, got {other}"),
            }
        }
        assert_eq!(status_of(GuardError::Unauthenticated), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_ordering_errors() {
        assert_eq!(
            status_of(OrderingError::InvalidPosition { position: 9, max: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(OrderingError::TaskNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(OrderingError::InvariantViolation("gap".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(OrderingError::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StoreError::Contention("40P01".to_string())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_activity_errors() {
        assert_eq!(status_of(ActivityError::AssigneeNotMember), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ActivityError::AlreadyAssigned), StatusCode::CONFLICT);
        assert_eq!(status_of(ActivityError::NotCommentAuthor), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ActivityError::CommentNotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_project_errors() {
        assert_eq!(status_of(ProjectError::LastMember), StatusCode::CONFLICT);
        assert_eq!(status_of(ProjectError::SelfRoleChange), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(StoreError::Conflict("users_email_key".to_string())),
            StatusCode::CONFLICT
        );
    }
}
