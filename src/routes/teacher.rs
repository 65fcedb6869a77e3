use crate::{AppState, handlers::teacher};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Teacher Router Module
///
/// Journey authoring. Teachers may only touch their own journeys; admins may
/// touch any. Both rules live in the access policy, not here.
pub fn teacher_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/journeys",
            get(teacher::list_journeys).post(teacher::create_journey),
        )
        .route(
            "/journeys/{journey_id}",
            get(teacher::get_journey)
                .put(teacher::update_journey)
                .delete(teacher::delete_journey),
        )
        .route("/journeys/{journey_id}/publish", put(teacher::publish_journey))
        .route(
            "/journeys/{journey_id}/thumbnail",
            put(teacher::upload_thumbnail).delete(teacher::delete_thumbnail),
        )
        // --- Lessons ---
        .route("/journeys/{journey_id}/lessons", post(teacher::create_lesson))
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}",
            get(teacher::get_lesson)
                .put(teacher::update_lesson)
                .delete(teacher::delete_lesson),
        )
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}/move",
            post(teacher::move_lesson),
        )
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}/video",
            put(teacher::upload_video).delete(teacher::delete_video),
        )
        // --- Materials ---
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}/materials/link",
            post(teacher::add_link_material),
        )
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}/materials/pdf",
            post(teacher::add_pdf_material),
        )
        .route(
            "/journeys/{journey_id}/lessons/{lesson_id}/materials/{material_id}",
            delete(teacher::delete_material),
        )
}
