use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// User management. Every handler re-checks the admin role through the
/// policy, so the router itself only needs authentication.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/users
        .route("/users", get(admin::list_users).post(admin::create_user))
        // PUT/DELETE /admin/users/{user_id}
        // Deleting your own account is refused with 403.
        .route(
            "/users/{user_id}",
            put(admin::update_user).delete(admin::delete_user),
        )
}
