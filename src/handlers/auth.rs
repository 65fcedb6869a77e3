use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, AppResult, ErrorBody},
    extract::ApiJson,
    models::{
        self, ChangePasswordRequest, LoginRequest, LoginResponse, UpdateProfileRequest, User,
    },
};

/// login
///
/// [Public Route] Exchanges email and password for a session token.
/// Unknown email and wrong password are the same 401 so accounts cannot be
/// enumerated.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let creds = state
        .repo
        .get_credentials_by_email(&email)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if !auth::verify_password(&payload.password, &creds.password_hash) {
        tracing::info!(user_id = %creds.id, "login rejected: wrong password");
        return Err(AppError::Unauthenticated);
    }

    let user = state
        .repo
        .get_user(creds.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    let token = auth::issue_token(&user, &state.config.jwt_secret, state.config.jwt_ttl_secs)?;

    tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
    Ok(Json(LoginResponse { token, user }))
}

/// get_me
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<User>> {
    let me = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(me))
}

/// update_profile
///
/// [Authenticated Route] Renames the caller. Email and role are admin-only
/// fields and are not accepted here.
#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile updated", body = User))
)]
pub async fn update_profile(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<User>> {
    let name = models::required("name", &payload.name)?;
    let updated = state
        .repo
        .update_profile_name(user.id, &name)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// change_password
///
/// [Authenticated Route] Requires the current password. A wrong current
/// password is 401, matching login.
#[utoipa::path(
    put,
    path = "/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password is wrong", body = ErrorBody)
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::validation(
            "current_password and new_password are required",
        ));
    }

    let creds = state
        .repo
        .get_credentials(user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !auth::verify_password(&payload.current_password, &creds.password_hash) {
        return Err(AppError::Unauthenticated);
    }

    let hash = auth::hash_password(&payload.new_password)?;
    state.repo.set_password_hash(user.id, &hash).await?;
    tracing::info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
