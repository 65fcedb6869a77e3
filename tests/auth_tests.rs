mod common;

use std::time::{SystemTime, UNIX_EPOCH};

use common::test_context;
use jsonwebtoken::{EncodingKey, Header, encode};
use learning_portal::{
    auth::{Claims, decode_token, hash_password, issue_token, verify_password},
    config::BootstrapAdmin,
    error::AppError,
    models::{Role, User},
    repository::Repository,
    seed,
};
use uuid::Uuid;

const SECRET: &str = "auth-tests-secret";

fn user(role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        name: "Token Holder".to_string(),
        email: "holder@portal.test".to_string(),
        role,
        ..User::default()
    }
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as usize
}

// --- JWT ---

#[test]
fn test_token_round_trip_carries_subject_and_role() {
    let holder = user(Role::Teacher);
    let token = issue_token(&holder, SECRET, 3600).expect("sign");

    let claims = decode_token(&token, SECRET).expect("decode");
    assert_eq!(claims.sub, holder.id);
    assert_eq!(claims.role, Role::Teacher);
    assert!(claims.exp > claims.iat);
}

#[test]
fn test_token_with_wrong_secret_is_unauthenticated() {
    let token = issue_token(&user(Role::Student), "secret-one", 3600).expect("sign");
    assert_eq!(
        decode_token(&token, "secret-two").err(),
        Some(AppError::Unauthenticated)
    );
}

#[test]
fn test_expired_token_is_unauthenticated() {
    let issued = now() - 7200;
    let claims = Claims {
        sub: Uuid::new_v4(),
        role: Role::Student,
        iat: issued,
        exp: issued + 60,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("sign");

    assert_eq!(
        decode_token(&token, SECRET).err(),
        Some(AppError::Unauthenticated)
    );
}

#[test]
fn test_garbage_token_is_unauthenticated() {
    assert_eq!(
        decode_token("not.a.jwt", SECRET).err(),
        Some(AppError::Unauthenticated)
    );
}

// --- Passwords ---

#[test]
fn test_password_hash_verifies() {
    let hash = hash_password("correct horse").expect("hash");
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
}

#[test]
fn test_hashes_are_salted() {
    let first = hash_password("same").expect("hash");
    let second = hash_password("same").expect("hash");
    assert_ne!(first, second);
}

#[test]
fn test_malformed_stored_hash_never_verifies() {
    assert!(!verify_password("anything", "plaintext-in-db"));
}

// --- Bootstrap admin ---

#[tokio::test]
async fn test_bootstrap_admin_created_once() {
    let ctx = test_context();
    let config = BootstrapAdmin {
        email: " Root@Portal.Test ".to_string(),
        password: "first-login".to_string(),
        name: "Administrator".to_string(),
    };

    let created = seed::ensure_bootstrap_admin(&*ctx.repo, &config)
        .await
        .expect("seed")
        .expect("admin created on empty store");
    assert_eq!(created.role, Role::Admin);
    assert_eq!(created.email, "root@portal.test");

    let again = seed::ensure_bootstrap_admin(&*ctx.repo, &config)
        .await
        .expect("seed");
    assert!(again.is_none());
    assert_eq!(ctx.repo.list_users().await.expect("list").len(), 1);

    let creds = ctx
        .repo
        .get_credentials_by_email("root@portal.test")
        .await
        .expect("lookup")
        .expect("present");
    assert!(verify_password("first-login", &creds.password_hash));
}
