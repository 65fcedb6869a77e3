use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any logged-in user. The `AuthUser` route layer rejects missing
/// or invalid tokens before a handler runs; enrollment and visibility are
/// checked inside each handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Own account ---
        .route("/auth/me", get(handlers::auth::get_me))
        .route("/auth/profile", put(handlers::auth::update_profile))
        .route("/auth/password", put(handlers::auth::change_password))
        // --- Catalogue ---
        // Static segments win over `{journey_id}` in axum's matcher.
        .route("/journeys/available", get(handlers::student::available_journeys))
        .route("/journeys/enrolled", get(handlers::student::enrolled_journeys))
        .route("/journeys/{journey_id}", get(handlers::student::get_journey))
        .route("/journeys/{journey_id}/enroll", post(handlers::student::enroll))
        // --- Lessons & progress ---
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}",
            get(handlers::student::get_lesson),
        )
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}/progress",
            put(handlers::student::record_progress),
        )
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}/complete",
            post(handlers::student::complete_lesson),
        )
        // GET /files/{*path}
        // Serves stored videos, documents and cover images.
        .route("/files/{*path}", get(handlers::files::get_file))
}
