use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    access::{self, ResourceRef},
    auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    extract::ApiPath,
    handlers::lesson_in_journey,
    policy::Action,
    storage::{self, BlobOwner},
};

/// get_file
///
/// [Authenticated Route] Streams a stored blob. Access follows the owner
/// encoded in the key: cover images need the journey to be visible, lesson
/// videos and documents need lesson access.
#[utoipa::path(
    get,
    path = "/files/{path}",
    params(("path" = String, Path, description = "Stored blob key")),
    responses(
        (status = 200, description = "File contents"),
        (status = 403, description = "No access to the owning lesson", body = ErrorBody),
        (status = 404, description = "Unknown key", body = ErrorBody)
    )
)]
pub async fn get_file(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(path): ApiPath<String>,
) -> AppResult<Response> {
    let key = storage::sanitize_key(&path);
    let owner = storage::parse_key(&key).ok_or(AppError::NotFound)?;

    match owner {
        BlobOwner {
            journey_id,
            lesson_id: None,
        } => {
            access::check(
                &*state.repo,
                &user,
                Action::ViewJourney,
                ResourceRef::Journey(journey_id),
            )
            .await?;
        }
        BlobOwner {
            journey_id,
            lesson_id: Some(lesson_id),
        } => {
            access::check(
                &*state.repo,
                &user,
                Action::AttendLesson,
                ResourceRef::Journey(journey_id),
            )
            .await?;
            lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;
        }
    }

    let bytes = state.storage.get(&key).await?;
    tracing::debug!(%key, size = bytes.len(), "serving file");
    Ok((
        [(header::CONTENT_TYPE, storage::content_type_for(&key))],
        bytes,
    )
        .into_response())
}
