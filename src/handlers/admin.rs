use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, AppResult, ErrorBody},
    extract::{ApiJson, ApiPath},
    handlers::normalize_email,
    models::{self, CreateUserRequest, NewUser, Role, UpdateUserRequest, User, UserUpdate},
    policy::{self, Action, Resource},
};

fn require(user: &AuthUser, action: Action) -> AppResult<()> {
    policy::authorize(Some(user), &action, &Resource::None).into_result()
}

/// list_users
///
/// [Admin Route] Every account, newest first.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn list_users(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    require(&user, Action::ManageUsers)?;
    Ok(Json(state.repo.list_users().await?))
}

/// create_user
///
/// [Admin Route] Creates an account with any role. A taken email is 409.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn create_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    require(&user, Action::ManageUsers)?;

    let name = models::required("name", &payload.name)?;
    let email = normalize_email(&payload.email)?;
    let role: Role = payload.role.trim().parse()?;
    if payload.password.is_empty() {
        return Err(AppError::validation("password is required"));
    }

    let created = state
        .repo
        .create_user(NewUser {
            name,
            email,
            password_hash: auth::hash_password(&payload.password)?,
            role,
        })
        .await?;

    tracing::info!(admin_id = %user.id, user_id = %created.id, role = %created.role, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_user
///
/// [Admin Route] Full update. An absent or empty password keeps the current
/// one.
#[utoipa::path(
    put,
    path = "/admin/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "No such user", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    require(&user, Action::ManageUsers)?;

    let name = models::required("name", &payload.name)?;
    let email = normalize_email(&payload.email)?;
    let role: Role = payload.role.trim().parse()?;
    let password_hash = match payload.password.as_deref() {
        Some(password) if !password.is_empty() => Some(auth::hash_password(password)?),
        _ => None,
    };

    let updated = state
        .repo
        .update_user(
            user_id,
            UserUpdate {
                name,
                email,
                role,
                password_hash,
            },
        )
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// delete_user
///
/// [Admin Route] Deletes an account and, by cascade, everything it owns.
/// Deleting your own account is refused.
#[utoipa::path(
    delete,
    path = "/admin/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin, or own account", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    require(&user, Action::DeleteUser { target: user_id })?;

    if !state.repo.delete_user(user_id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(admin_id = %user.id, %user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
