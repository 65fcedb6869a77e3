use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

// --- Closed Enumerations ---

/// Role
///
/// The RBAC field of a user. Stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Teacher,
    #[default]
    Student,
}

impl Role {
    /// Teachers and admins may author journeys.
    pub fn can_author(self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            _ => Err(AppError::validation("role must be admin, teacher or student")),
        }
    }
}

/// MaterialType
///
/// `pdf` materials carry a blob reference in `content`, `link` materials a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[sqlx(type_name = "material_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MaterialType {
    #[default]
    Pdf,
    Link,
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Public view of a `users` row. The password hash is deliberately absent; it
/// only travels inside `UserCredentials`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal row used by login and password changes.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
}

/// NewUser
///
/// Insert payload for the repository; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// UserUpdate
///
/// Admin-side full update. `password_hash` is `None` when the password is kept.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

/// Journey
///
/// A course owned by one teacher. New journeys start unpublished.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Journey {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    // Blob reference of the cover image, served through /files.
    pub thumbnail_path: Option<String>,
    pub teacher_id: Uuid,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Lesson
///
/// `order_number` is 1-based and dense within its journey.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Lesson {
    pub id: Uuid,
    pub journey_id: Uuid,
    pub title: String,
    pub description: String,
    pub video_path: Option<String>,
    pub order_number: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Material {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub title: String,
    pub material_type: MaterialType,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewMaterial
///
/// Insert payload. For pdf materials `content` is the stored blob path.
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub material_type: MaterialType,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Enrollment {
    pub user_id: Uuid,
    pub journey_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Progress
///
/// A student's watch/completion state for one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Progress {
    pub user_id: Uuid,
    pub lesson_id: Uuid,
    pub completed: bool,
    // Seconds into the lesson video.
    pub last_watched_position: i32,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Read Models (Output) ---

/// JourneySummary
///
/// Listing row for the available/enrolled/teacher journey lists.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct JourneySummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail_path: Option<String>,
    pub is_published: bool,
}

impl From<Journey> for JourneySummary {
    fn from(journey: Journey) -> Self {
        Self {
            id: journey.id,
            title: journey.title,
            description: journey.description,
            thumbnail_path: journey.thumbnail_path,
            is_published: journey.is_published,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TeacherRef {
    pub id: Uuid,
    pub name: String,
}

/// LessonOutline
///
/// A lesson as listed on the student journey page, with the caller's
/// completion flag joined in.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct LessonOutline {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub order_number: i32,
    pub completed: bool,
}

/// JourneyDetail
///
/// Student-facing journey page (GET /journeys/{journey_id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct JourneyDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail_path: Option<String>,
    pub is_published: bool,
    pub teacher: TeacherRef,
    pub enrolled: bool,
    pub lessons: Vec<LessonOutline>,
}

/// LessonDetail
///
/// Student-facing lesson page: content, materials and the caller's progress.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LessonDetail {
    pub lesson: Lesson,
    pub materials: Vec<Material>,
    pub completed: bool,
    pub last_watched_position: i32,
}

/// TeacherJourney
///
/// Authoring view of a journey with every lesson in order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TeacherJourney {
    pub journey: Journey,
    pub lessons: Vec<Lesson>,
}

/// LessonWithMaterials
///
/// Authoring view of a single lesson.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LessonWithMaterials {
    pub lesson: Lesson,
    pub materials: Vec<Material>,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// CreateUserRequest
///
/// Admin payload for POST /admin/users. `role` is validated against `Role`
/// rather than deserialised directly so a bad value is a validation error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// UpdateUserRequest
///
/// Admin payload for PUT /admin/users/{user_id}. An absent or empty password
/// keeps the current one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// JourneyRequest
///
/// Create and update payload for journeys.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct JourneyRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// LessonRequest
///
/// Create and update payload for lessons. Position is never client-chosen.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LessonRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MoveLessonRequest {
    /// "up" or "down".
    #[schema(example = "up")]
    pub direction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LinkMaterialRequest {
    pub title: String,
    #[schema(example = "https://example.com/reading")]
    pub url: String,
}

/// RecordProgressRequest
///
/// Video position in seconds. Kept as `i64` on the wire so out-of-range
/// values reach validation instead of failing deserialisation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RecordProgressRequest {
    pub position: i64,
}

/// Trims `value` and rejects it when empty, naming `field` in the error.
pub fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
