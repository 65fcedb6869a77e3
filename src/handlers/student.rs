use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    access::{self, ResourceRef},
    auth::AuthUser,
    error::{AppError, AppResult, ConflictKind, ErrorBody},
    extract::{ApiJson, ApiPath},
    handlers::lesson_in_journey,
    models::{
        Enrollment, JourneyDetail, JourneySummary, LessonDetail, Progress,
        RecordProgressRequest, TeacherRef,
    },
    policy::{Action, Resource},
    tracker::{self, ProgressEvent, ProgressState},
};

/// available_journeys
///
/// [Authenticated Route] Published journeys the caller has not enrolled in.
#[utoipa::path(
    get,
    path = "/journeys/available",
    responses((status = 200, description = "Journeys open for enrollment", body = [JourneySummary]))
)]
pub async fn available_journeys(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<JourneySummary>>> {
    Ok(Json(state.repo.list_available_journeys(user.id).await?))
}

/// enrolled_journeys
///
/// [Authenticated Route] Published journeys the caller is enrolled in.
#[utoipa::path(
    get,
    path = "/journeys/enrolled",
    responses((status = 200, description = "Enrolled journeys", body = [JourneySummary]))
)]
pub async fn enrolled_journeys(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<JourneySummary>>> {
    Ok(Json(state.repo.list_enrolled_journeys(user.id).await?))
}

/// get_journey
///
/// [Authenticated Route] Journey page with teacher, enrollment flag and the
/// lesson outline. Unpublished journeys are 404 to everyone but their teacher
/// and admins.
#[utoipa::path(
    get,
    path = "/journeys/{journey_id}",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    responses(
        (status = 200, description = "Journey detail", body = JourneyDetail),
        (status = 404, description = "Missing or not visible", body = ErrorBody)
    )
)]
pub async fn get_journey(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
) -> AppResult<Json<JourneyDetail>> {
    let resource = access::check(
        &*state.repo,
        &user,
        Action::ViewJourney,
        ResourceRef::Journey(journey_id),
    )
    .await?;
    let enrolled = matches!(resource, Resource::Journey(j) if j.enrolled);

    let journey = state
        .repo
        .get_journey(journey_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let teacher = state
        .repo
        .get_user(journey.teacher_id)
        .await?
        .map(|t| TeacherRef { id: t.id, name: t.name })
        .unwrap_or(TeacherRef {
            id: journey.teacher_id,
            name: String::new(),
        });
    let lessons = state.repo.lesson_outline(journey_id, user.id).await?;

    Ok(Json(JourneyDetail {
        id: journey.id,
        title: journey.title,
        description: journey.description,
        thumbnail_path: journey.thumbnail_path,
        is_published: journey.is_published,
        teacher,
        enrolled,
        lessons,
    }))
}

/// enroll
///
/// [Authenticated Route] Enrolls the caller. Only published journeys accept
/// enrollments and a second attempt is 409.
#[utoipa::path(
    post,
    path = "/journeys/{journey_id}/enroll",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 404, description = "Missing or unpublished", body = ErrorBody),
        (status = 409, description = "Already enrolled", body = ErrorBody)
    )
)]
pub async fn enroll(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    access::check(
        &*state.repo,
        &user,
        Action::Enroll,
        ResourceRef::Journey(journey_id),
    )
    .await?;

    // A concurrent enroll can win between the check and the insert.
    let enrollment = state
        .repo
        .enroll(user.id, journey_id)
        .await?
        .ok_or(AppError::Conflict(ConflictKind::AlreadyEnrolled))?;

    tracing::info!(user_id = %user.id, %journey_id, "enrolled");
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// get_lesson
///
/// [Authenticated Route] Lesson content, materials and the caller's progress.
#[utoipa::path(
    get,
    path = "/journeys/{journey_id}/lessons/{lesson_id}",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Lesson detail", body = LessonDetail),
        (status = 403, description = "Not enrolled", body = ErrorBody),
        (status = 404, description = "Missing", body = ErrorBody)
    )
)]
pub async fn get_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<LessonDetail>> {
    access::check(
        &*state.repo,
        &user,
        Action::AttendLesson,
        ResourceRef::Journey(journey_id),
    )
    .await?;

    let lesson = lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;
    let materials = state.repo.list_materials(lesson.id).await?;
    let progress = ProgressState::of(state.repo.get_progress(user.id, lesson.id).await?.as_ref());

    Ok(Json(LessonDetail {
        lesson,
        materials,
        completed: progress.is_completed(),
        last_watched_position: progress.position(),
    }))
}

/// record_progress
///
/// [Authenticated Route] Stores the video position in seconds. A completed
/// lesson stays completed.
#[utoipa::path(
    put,
    path = "/journeys/{journey_id}/lessons/{lesson_id}/progress",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = RecordProgressRequest,
    responses(
        (status = 200, description = "Progress stored", body = Progress),
        (status = 400, description = "Invalid position", body = ErrorBody)
    )
)]
pub async fn record_progress(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<RecordProgressRequest>,
) -> AppResult<Json<Progress>> {
    let position = tracker::validate_position(payload.position)?;
    access::check(
        &*state.repo,
        &user,
        Action::AttendLesson,
        ResourceRef::Journey(journey_id),
    )
    .await?;
    let lesson = lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;

    let progress = state
        .repo
        .apply_progress(user.id, lesson.id, ProgressEvent::Watched { position })
        .await?;
    Ok(Json(progress))
}

/// complete_lesson
///
/// [Authenticated Route] Marks the lesson complete for the caller.
/// Idempotent: repeating it returns the same completed state.
#[utoipa::path(
    post,
    path = "/journeys/{journey_id}/lessons/{lesson_id}/complete",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Lesson completed", body = Progress),
        (status = 403, description = "Not enrolled", body = ErrorBody),
        (status = 404, description = "Missing", body = ErrorBody)
    )
)]
pub async fn complete_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<Progress>> {
    access::check(
        &*state.repo,
        &user,
        Action::AttendLesson,
        ResourceRef::Journey(journey_id),
    )
    .await?;
    let lesson = lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;

    let progress = state
        .repo
        .apply_progress(user.id, lesson.id, ProgressEvent::MarkedComplete)
        .await?;
    tracing::debug!(user_id = %user.id, %lesson_id, "lesson completed");
    Ok(Json(progress))
}
