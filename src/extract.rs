//! Request extractors whose rejections are `AppError`s, so malformed input
//! gets the same `{ kind, message }` body as every other failure.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, request::Parts},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// ApiJson
///
/// `Json<T>` with a `validation_error` rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// ApiPath
///
/// `Path<T>`; a segment that does not parse (e.g. a malformed UUID) is a
/// `validation_error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("rejected JSON body: {}", rejection.body_text());
        let message = match rejection {
            JsonRejection::JsonDataError(_) => "request body has missing or invalid fields",
            JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
            JsonRejection::MissingJsonContentType(_) => {
                "request body must be sent as application/json"
            }
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "request body is too large"
            }
            _ => "request body could not be read",
        };
        AppError::validation(message)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(err) => {
                tracing::debug!("rejected path: {}", err.body_text());
                AppError::validation("path parameter is malformed")
            }
            other => {
                tracing::error!("route is missing path parameters: {}", other.body_text());
                AppError::Internal
            }
        }
    }
}
