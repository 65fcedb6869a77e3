use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// ConflictKind
///
/// The two uniqueness rules a caller can trip over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    AlreadyEnrolled,
    DuplicateEmail,
}

/// AppError
///
/// The single failure taxonomy of the service. Handlers, the access policy, the
/// ordering engine and the repository all speak this type, and `IntoResponse`
/// turns it into a stable `{ kind, message }` body.
///
/// Store and driver details never reach the client: they are logged where the
/// error is created and collapsed into `Internal`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("you are not allowed to perform this action")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("conflict: {0:?}")]
    Conflict(ConflictKind),
    #[error("{0}")]
    Validation(String),
    #[error("lesson cannot move past the first or last position")]
    Boundary,
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("internal server error")]
    Internal,
}

/// ErrorBody
///
/// Wire format for every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `not_found` or `already_enrolled`.
    pub kind: String,
    pub message: String,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable code used as `kind` in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict(ConflictKind::AlreadyEnrolled) => "already_enrolled",
            Self::Conflict(ConflictKind::DuplicateEmail) => "duplicate_email",
            Self::Validation(_) => "validation_error",
            Self::Boundary => "boundary_error",
            Self::Storage(_) => "storage_error",
            Self::Internal => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) | Self::Boundary => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message. Storage failures keep their detail in the logs only.
    pub fn message(&self) -> String {
        match self {
            Self::Conflict(ConflictKind::AlreadyEnrolled) => {
                "you are already enrolled in this journey".to_string()
            }
            Self::Conflict(ConflictKind::DuplicateEmail) => {
                "this email is already in use".to_string()
            }
            Self::Storage(_) => "the file could not be stored".to_string(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind().to_string(),
            message: self.message(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Storage(detail) = &self {
            tracing::warn!("storage error surfaced to client: {}", detail);
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.constraint() == Some("users_email_key") {
                return Self::Conflict(ConflictKind::DuplicateEmail);
            }
        }
        tracing::error!("database error: {:?}", err);
        Self::Internal
    }
}

pub type AppResult<T> = Result<T, AppError>;
