use crate::{
    auth,
    config::BootstrapAdmin,
    error::AppResult,
    models::{NewUser, Role, User},
    repository::Repository,
};

/// ensure_bootstrap_admin
///
/// Creates the configured first administrator unless an account with that
/// email already exists. Returns the created user, if any.
pub async fn ensure_bootstrap_admin(
    repo: &dyn Repository,
    admin: &BootstrapAdmin,
) -> AppResult<Option<User>> {
    let email = admin.email.trim().to_lowercase();
    if repo.find_user_by_email(&email).await?.is_some() {
        tracing::debug!(%email, "bootstrap admin already present");
        return Ok(None);
    }

    let user = repo
        .create_user(NewUser {
            name: admin.name.clone(),
            email,
            password_hash: auth::hash_password(&admin.password)?,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = %user.id, "bootstrap admin created");
    Ok(Some(user))
}
