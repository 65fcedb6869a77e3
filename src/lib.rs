use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Decision core.
pub mod access;
pub mod ordering;
pub mod policy;
pub mod tracker;

// Services and plumbing.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod seed;
pub mod storage;

pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public, teacher};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{LocalStorage, MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json` and
/// browsable through Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::get_me, handlers::auth::update_profile,
        handlers::auth::change_password,
        handlers::student::available_journeys, handlers::student::enrolled_journeys,
        handlers::student::get_journey, handlers::student::enroll,
        handlers::student::get_lesson, handlers::student::record_progress,
        handlers::student::complete_lesson,
        handlers::files::get_file,
        handlers::teacher::list_journeys, handlers::teacher::create_journey,
        handlers::teacher::get_journey, handlers::teacher::update_journey,
        handlers::teacher::delete_journey, handlers::teacher::publish_journey,
        handlers::teacher::upload_thumbnail, handlers::teacher::delete_thumbnail,
        handlers::teacher::create_lesson, handlers::teacher::get_lesson,
        handlers::teacher::update_lesson, handlers::teacher::delete_lesson,
        handlers::teacher::move_lesson, handlers::teacher::upload_video,
        handlers::teacher::delete_video, handlers::teacher::add_link_material,
        handlers::teacher::add_pdf_material, handlers::teacher::delete_material,
        handlers::admin::list_users, handlers::admin::create_user,
        handlers::admin::update_user, handlers::admin::delete_user,
    ),
    components(
        schemas(
            models::Role, models::MaterialType, models::User, models::Journey,
            models::Lesson, models::Material, models::Enrollment, models::Progress,
            models::JourneySummary, models::TeacherRef, models::LessonOutline,
            models::JourneyDetail, models::LessonDetail, models::TeacherJourney,
            models::LessonWithMaterials, models::LoginRequest, models::LoginResponse,
            models::CreateUserRequest, models::UpdateUserRequest,
            models::UpdateProfileRequest, models::ChangePasswordRequest,
            models::JourneyRequest, models::LessonRequest, models::MoveLessonRequest,
            models::LinkMaterialRequest, models::RecordProgressRequest,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "learning-portal", description = "Journeys, lessons and student progress")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Everything a request may need, cloned cheaply into each handler.
#[derive(Clone)]
pub struct AppState {
    /// Relational store behind the `Repository` trait.
    pub repo: RepositoryState,
    /// Blob store behind the `StorageService` trait.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the `AuthUser` extractor for every protected route, so a bad or
/// missing token is a 401 before any handler or body parsing happens.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

// Headroom for multipart framing and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// create_router
///
/// Assembles routes, the authentication layer, the request body limit and the
/// observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let body_limit = state
        .config
        .upload_limits
        .largest()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let protected = Router::new()
        .merge(authenticated::authenticated_routes())
        .nest("/teacher", teacher::teacher_routes())
        .nest("/admin", admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// One span per request carrying method, uri and the `x-request-id` set by
/// `SetRequestIdLayer`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
