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
    error::{AppError, AppResult, ErrorBody},
    extract::{ApiJson, ApiPath},
    handlers::{MultipartForm, discard_blobs, lesson_in_journey},
    models::{
        self, Journey, JourneyRequest, Lesson, LessonRequest, LessonWithMaterials,
        LinkMaterialRequest, Material, MaterialType, MoveLessonRequest, NewMaterial,
        TeacherJourney,
    },
    ordering::Direction,
    policy::Action,
    storage::{self, BlobKind, BlobOwner},
};

/// Owner-or-admin gate shared by every journey-scoped authoring route.
async fn can_edit(state: &AppState, user: &AuthUser, journey_id: Uuid) -> AppResult<()> {
    access::check(
        &*state.repo,
        user,
        Action::EditJourney,
        ResourceRef::Journey(journey_id),
    )
    .await?;
    Ok(())
}

async fn journey_or_404(state: &AppState, journey_id: Uuid) -> AppResult<Journey> {
    state
        .repo
        .get_journey(journey_id)
        .await?
        .ok_or(AppError::NotFound)
}

// --- Journeys ---

/// list_journeys
///
/// [Teacher Route] Journeys authored by the caller, published or not.
#[utoipa::path(
    get,
    path = "/teacher/journeys",
    responses(
        (status = 200, description = "Own journeys", body = [Journey]),
        (status = 403, description = "Not a teacher or admin", body = ErrorBody)
    )
)]
pub async fn list_journeys(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Journey>>> {
    access::check(&*state.repo, &user, Action::CreateJourney, ResourceRef::None).await?;
    Ok(Json(state.repo.list_teacher_journeys(user.id).await?))
}

/// create_journey
///
/// [Teacher Route] New journeys start unpublished and owned by the caller.
#[utoipa::path(
    post,
    path = "/teacher/journeys",
    request_body = JourneyRequest,
    responses(
        (status = 201, description = "Journey created", body = Journey),
        (status = 400, description = "Missing title", body = ErrorBody)
    )
)]
pub async fn create_journey(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<JourneyRequest>,
) -> AppResult<(StatusCode, Json<Journey>)> {
    access::check(&*state.repo, &user, Action::CreateJourney, ResourceRef::None).await?;
    let title = models::required("title", &payload.title)?;

    let journey = state
        .repo
        .create_journey(user.id, &title, payload.description.trim())
        .await?;
    tracing::info!(teacher_id = %user.id, journey_id = %journey.id, "journey created");
    Ok((StatusCode::CREATED, Json(journey)))
}

/// get_journey
///
/// [Teacher Route] Authoring view: the journey with all lessons in order.
#[utoipa::path(
    get,
    path = "/teacher/journeys/{journey_id}",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    responses(
        (status = 200, description = "Journey with lessons", body = TeacherJourney),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Missing", body = ErrorBody)
    )
)]
pub async fn get_journey(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
) -> AppResult<Json<TeacherJourney>> {
    can_edit(&state, &user, journey_id).await?;
    let journey = journey_or_404(&state, journey_id).await?;
    let lessons = state.repo.list_lessons(journey_id).await?;
    Ok(Json(TeacherJourney { journey, lessons }))
}

#[utoipa::path(
    put,
    path = "/teacher/journeys/{journey_id}",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    request_body = JourneyRequest,
    responses((status = 200, description = "Journey updated", body = Journey))
)]
pub async fn update_journey(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<JourneyRequest>,
) -> AppResult<Json<Journey>> {
    can_edit(&state, &user, journey_id).await?;
    let title = models::required("title", &payload.title)?;

    let journey = state
        .repo
        .update_journey(journey_id, &title, payload.description.trim())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(journey))
}

/// delete_journey
///
/// [Teacher Route] Removes the journey with its lessons, materials,
/// enrollments and progress. Stored files are cleaned up afterwards.
#[utoipa::path(
    delete,
    path = "/teacher/journeys/{journey_id}",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner", body = ErrorBody)
    )
)]
pub async fn delete_journey(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    can_edit(&state, &user, journey_id).await?;
    let blobs = state.repo.delete_journey(journey_id).await?;
    tracing::info!(user_id = %user.id, %journey_id, "journey deleted");
    discard_blobs(&*state.storage, blobs).await;
    Ok(StatusCode::NO_CONTENT)
}

/// publish_journey
///
/// [Teacher Route] Body is a bare JSON boolean.
#[utoipa::path(
    put,
    path = "/teacher/journeys/{journey_id}/publish",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    request_body = bool,
    responses((status = 200, description = "Visibility changed", body = Journey))
)]
pub async fn publish_journey(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
    ApiJson(published): ApiJson<bool>,
) -> AppResult<Json<Journey>> {
    can_edit(&state, &user, journey_id).await?;
    let journey = state
        .repo
        .set_journey_published(journey_id, published)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(%journey_id, published, "journey visibility changed");
    Ok(Json(journey))
}

/// upload_thumbnail
///
/// [Teacher Route] Multipart field `file` (jpeg, png, webp or gif). The new
/// image is stored before the reference changes; the old image is removed
/// after.
#[utoipa::path(
    put,
    path = "/teacher/journeys/{journey_id}/thumbnail",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    responses(
        (status = 200, description = "Thumbnail replaced", body = Journey),
        (status = 400, description = "Missing or invalid image", body = ErrorBody),
        (status = 502, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn upload_thumbnail(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
    mut form: MultipartForm,
) -> AppResult<Json<Journey>> {
    can_edit(&state, &user, journey_id).await?;
    let upload = form.take_file()?;

    let key = storage::store_upload(
        &*state.storage,
        &state.config.upload_limits,
        upload,
        BlobOwner::cover(journey_id),
        BlobKind::Image,
    )
    .await?;

    let previous = match state
        .repo
        .set_journey_thumbnail(journey_id, Some(key.clone()))
        .await
    {
        Ok(previous) => previous,
        Err(e) => {
            discard_blobs(&*state.storage, vec![key]).await;
            return Err(e);
        }
    };
    discard_blobs(&*state.storage, previous.into_iter().collect()).await;

    Ok(Json(journey_or_404(&state, journey_id).await?))
}

#[utoipa::path(
    delete,
    path = "/teacher/journeys/{journey_id}/thumbnail",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    responses((status = 200, description = "Thumbnail removed", body = Journey))
)]
pub async fn delete_thumbnail(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
) -> AppResult<Json<Journey>> {
    can_edit(&state, &user, journey_id).await?;
    let previous = state.repo.set_journey_thumbnail(journey_id, None).await?;
    discard_blobs(&*state.storage, previous.into_iter().collect()).await;
    Ok(Json(journey_or_404(&state, journey_id).await?))
}

// --- Lessons ---

/// create_lesson
///
/// [Teacher Route] Appends a lesson at the end of the journey.
#[utoipa::path(
    post,
    path = "/teacher/journeys/{journey_id}/lessons",
    params(("journey_id" = Uuid, Path, description = "Journey ID")),
    request_body = LessonRequest,
    responses(
        (status = 201, description = "Lesson appended", body = Lesson),
        (status = 400, description = "Missing title", body = ErrorBody)
    )
)]
pub async fn create_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(journey_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<LessonRequest>,
) -> AppResult<(StatusCode, Json<Lesson>)> {
    can_edit(&state, &user, journey_id).await?;
    let title = models::required("title", &payload.title)?;

    let lesson = state
        .repo
        .append_lesson(journey_id, &title, payload.description.trim())
        .await?;
    tracing::info!(%journey_id, lesson_id = %lesson.id, order = lesson.order_number, "lesson appended");
    Ok((StatusCode::CREATED, Json(lesson)))
}

#[utoipa::path(
    get,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    responses((status = 200, description = "Lesson with materials", body = LessonWithMaterials))
)]
pub async fn get_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<LessonWithMaterials>> {
    can_edit(&state, &user, journey_id).await?;
    let lesson = lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;
    let materials = state.repo.list_materials(lesson.id).await?;
    Ok(Json(LessonWithMaterials { lesson, materials }))
}

#[utoipa::path(
    put,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = LessonRequest,
    responses((status = 200, description = "Lesson updated", body = Lesson))
)]
pub async fn update_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<LessonRequest>,
) -> AppResult<Json<Lesson>> {
    can_edit(&state, &user, journey_id).await?;
    let title = models::required("title", &payload.title)?;

    let lesson = state
        .repo
        .update_lesson(journey_id, lesson_id, &title, payload.description.trim())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(lesson))
}

/// delete_lesson
///
/// [Teacher Route] Deletes the lesson and closes the gap in the order.
#[utoipa::path(
    delete,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 204, description = "Deleted and renumbered"),
        (status = 404, description = "Missing", body = ErrorBody)
    )
)]
pub async fn delete_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    can_edit(&state, &user, journey_id).await?;
    let blobs = state.repo.delete_lesson(journey_id, lesson_id).await?;
    tracing::info!(%journey_id, %lesson_id, "lesson deleted");
    discard_blobs(&*state.storage, blobs).await;
    Ok(StatusCode::NO_CONTENT)
}

/// move_lesson
///
/// [Teacher Route] Swaps the lesson with its neighbour. Moving the first
/// lesson up or the last one down is 400 and changes nothing.
#[utoipa::path(
    post,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}/move",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = MoveLessonRequest,
    responses(
        (status = 200, description = "Lessons in their new order", body = [Lesson]),
        (status = 400, description = "No neighbour in that direction", body = ErrorBody)
    )
)]
pub async fn move_lesson(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<MoveLessonRequest>,
) -> AppResult<Json<Vec<Lesson>>> {
    let direction = Direction::parse(&payload.direction)?;
    can_edit(&state, &user, journey_id).await?;

    let lessons = state
        .repo
        .move_lesson(journey_id, lesson_id, direction)
        .await?;
    Ok(Json(lessons))
}

/// upload_video
///
/// [Teacher Route] Multipart field `file` (mp4, webm or ogg).
#[utoipa::path(
    put,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}/video",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Video replaced", body = Lesson),
        (status = 400, description = "Missing or invalid video", body = ErrorBody),
        (status = 502, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn upload_video(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
    mut form: MultipartForm,
) -> AppResult<Json<Lesson>> {
    can_edit(&state, &user, journey_id).await?;
    lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;
    let upload = form.take_file()?;

    let key = storage::store_upload(
        &*state.storage,
        &state.config.upload_limits,
        upload,
        BlobOwner::lesson(journey_id, lesson_id),
        BlobKind::Video,
    )
    .await?;

    let previous = match state
        .repo
        .set_lesson_video(journey_id, lesson_id, Some(key.clone()))
        .await
    {
        Ok(previous) => previous,
        Err(e) => {
            discard_blobs(&*state.storage, vec![key]).await;
            return Err(e);
        }
    };
    discard_blobs(&*state.storage, previous.into_iter().collect()).await;

    Ok(Json(lesson_in_journey(&*state.repo, journey_id, lesson_id).await?))
}

#[utoipa::path(
    delete,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}/video",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    responses((status = 200, description = "Video removed", body = Lesson))
)]
pub async fn delete_video(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<Lesson>> {
    can_edit(&state, &user, journey_id).await?;
    let previous = state
        .repo
        .set_lesson_video(journey_id, lesson_id, None)
        .await?;
    discard_blobs(&*state.storage, previous.into_iter().collect()).await;
    Ok(Json(lesson_in_journey(&*state.repo, journey_id, lesson_id).await?))
}

// --- Materials ---

/// add_link_material
///
/// [Teacher Route] Attaches an external http(s) link to a lesson.
#[utoipa::path(
    post,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}/materials/link",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = LinkMaterialRequest,
    responses(
        (status = 201, description = "Material added", body = Material),
        (status = 400, description = "Missing title or bad URL", body = ErrorBody)
    )
)]
pub async fn add_link_material(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<LinkMaterialRequest>,
) -> AppResult<(StatusCode, Json<Material>)> {
    can_edit(&state, &user, journey_id).await?;
    let title = models::required("title", &payload.title)?;
    let url = models::required("url", &payload.url)?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::validation("url must start with http:// or https://"));
    }
    let lesson = lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;

    let material = state
        .repo
        .add_material(
            lesson.id,
            NewMaterial {
                title,
                material_type: MaterialType::Link,
                content: url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(material)))
}

/// add_pdf_material
///
/// [Teacher Route] Multipart `title` plus `file` (application/pdf).
#[utoipa::path(
    post,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}/materials/pdf",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 201, description = "Material added", body = Material),
        (status = 400, description = "Missing title or invalid file", body = ErrorBody),
        (status = 502, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn add_pdf_material(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id)): ApiPath<(Uuid, Uuid)>,
    mut form: MultipartForm,
) -> AppResult<(StatusCode, Json<Material>)> {
    can_edit(&state, &user, journey_id).await?;
    let lesson = lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;

    let title = models::required("title", form.text("title"))?;
    let upload = form.take_file()?;

    let key = storage::store_upload(
        &*state.storage,
        &state.config.upload_limits,
        upload,
        BlobOwner::lesson(journey_id, lesson.id),
        BlobKind::Document,
    )
    .await?;

    let material = match state
        .repo
        .add_material(
            lesson.id,
            NewMaterial {
                title,
                material_type: MaterialType::Pdf,
                content: key.clone(),
            },
        )
        .await
    {
        Ok(material) => material,
        Err(e) => {
            discard_blobs(&*state.storage, vec![key]).await;
            return Err(e);
        }
    };
    Ok((StatusCode::CREATED, Json(material)))
}

#[utoipa::path(
    delete,
    path = "/teacher/journeys/{journey_id}/lessons/{lesson_id}/materials/{material_id}",
    params(
        ("journey_id" = Uuid, Path, description = "Journey ID"),
        ("lesson_id" = Uuid, Path, description = "Lesson ID"),
        ("material_id" = Uuid, Path, description = "Material ID")
    ),
    responses(
        (status = 204, description = "Material removed"),
        (status = 404, description = "Missing", body = ErrorBody)
    )
)]
pub async fn delete_material(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((journey_id, lesson_id, material_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    can_edit(&state, &user, journey_id).await?;
    let lesson = lesson_in_journey(&*state.repo, journey_id, lesson_id).await?;

    let removed = state
        .repo
        .delete_material(lesson.id, material_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if removed.material_type == MaterialType::Pdf {
        discard_blobs(&*state.storage, vec![removed.content]).await;
    }
    Ok(StatusCode::NO_CONTENT)
}
