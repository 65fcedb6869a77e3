use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Enrollment, Journey, JourneySummary, Lesson, LessonOutline, Material,
        NewMaterial, NewUser, Progress, User, UserCredentials, UserUpdate,
    },
    ordering::{self, Direction, LessonSlot},
    tracker::{ProgressEvent, ProgressState},
};

/// Repository Trait
///
/// The persistence contract of the portal. Handlers only see this trait, so the
/// in-memory implementation used by the tests and `PostgresRepository` are
/// interchangeable behind `Arc<dyn Repository>`.
///
/// Methods that touch lesson ordering are transactional and hold the parent
/// journey's row lock for their whole duration.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    // Credentials are only read by login and password changes.
    async fn get_credentials_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>>;
    async fn get_credentials(&self, id: Uuid) -> AppResult<Option<UserCredentials>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Fails with `Conflict(DuplicateEmail)` when the email is taken.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> AppResult<Option<User>>;
    async fn update_profile_name(&self, id: Uuid, name: &str) -> AppResult<Option<User>>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<bool>;
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;

    // --- Journeys ---
    async fn get_journey(&self, id: Uuid) -> AppResult<Option<Journey>>;
    // Published journeys the user is not enrolled in.
    async fn list_available_journeys(&self, user_id: Uuid) -> AppResult<Vec<JourneySummary>>;
    // Published journeys the user is enrolled in.
    async fn list_enrolled_journeys(&self, user_id: Uuid) -> AppResult<Vec<JourneySummary>>;
    async fn list_teacher_journeys(&self, teacher_id: Uuid) -> AppResult<Vec<Journey>>;
    async fn create_journey(
        &self,
        teacher_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Journey>;
    async fn update_journey(
        &self,
        id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Option<Journey>>;
    async fn set_journey_published(&self, id: Uuid, published: bool)
    -> AppResult<Option<Journey>>;
    /// Replaces the thumbnail reference and returns the previous one.
    /// `NotFound` when the journey is gone.
    async fn set_journey_thumbnail(&self, id: Uuid, path: Option<String>)
    -> AppResult<Option<String>>;
    /// Deletes the journey with everything beneath it and returns the blob
    /// references that were owned by the deleted rows.
    async fn delete_journey(&self, id: Uuid) -> AppResult<Vec<String>>;

    // --- Lessons ---
    /// Lessons of a journey in ascending order.
    async fn list_lessons(&self, journey_id: Uuid) -> AppResult<Vec<Lesson>>;
    /// Lesson outline with the user's completion flag joined in.
    async fn lesson_outline(&self, journey_id: Uuid, user_id: Uuid)
    -> AppResult<Vec<LessonOutline>>;
    /// A lesson, only if it belongs to `journey_id`.
    async fn get_lesson(&self, journey_id: Uuid, lesson_id: Uuid) -> AppResult<Option<Lesson>>;
    /// Inserts at `max(order_number) + 1`.
    async fn append_lesson(
        &self,
        journey_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Lesson>;
    async fn update_lesson(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Option<Lesson>>;
    /// Swaps with the adjacent lesson and returns the journey's lessons in
    /// their new order. `Boundary` when there is no neighbour.
    async fn move_lesson(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        direction: Direction,
    ) -> AppResult<Vec<Lesson>>;
    /// Deletes and renumbers the survivors to `1..N`. Returns the blob
    /// references owned by the deleted lesson.
    async fn delete_lesson(&self, journey_id: Uuid, lesson_id: Uuid) -> AppResult<Vec<String>>;
    /// Replaces the video reference and returns the previous one.
    async fn set_lesson_video(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        path: Option<String>,
    ) -> AppResult<Option<String>>;

    // --- Materials ---
    async fn list_materials(&self, lesson_id: Uuid) -> AppResult<Vec<Material>>;
    async fn add_material(&self, lesson_id: Uuid, material: NewMaterial) -> AppResult<Material>;
    /// Removes a material of `lesson_id` and returns the removed row.
    async fn delete_material(&self, lesson_id: Uuid, material_id: Uuid)
    -> AppResult<Option<Material>>;

    // --- Enrollment & Progress ---
    async fn is_enrolled(&self, user_id: Uuid, journey_id: Uuid) -> AppResult<bool>;
    /// Idempotent insert: `None` when the pair already existed.
    async fn enroll(&self, user_id: Uuid, journey_id: Uuid) -> AppResult<Option<Enrollment>>;
    async fn get_progress(&self, user_id: Uuid, lesson_id: Uuid) -> AppResult<Option<Progress>>;
    /// Runs `event` through the progress state machine against the stored row,
    /// creating the row if needed. A transition that leaves the state as it was
    /// writes nothing, so repeating an event returns an identical `Progress`.
    async fn apply_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        event: ProgressEvent,
    ) -> AppResult<Progress>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer inside `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL through a shared `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, name, email, role, created_at, updated_at";
const JOURNEY_COLUMNS: &str =
    "id, title, description, thumbnail_path, teacher_id, is_published, created_at, updated_at";
const LESSON_COLUMNS: &str =
    "id, journey_id, title, description, video_path, order_number, created_at, updated_at";
const MATERIAL_COLUMNS: &str = "id, lesson_id, title, material_type, content, created_at";
const PROGRESS_COLUMNS: &str = "user_id, lesson_id, completed, last_watched_position, updated_at";

/// Takes the journey row lock that serialises ordering changes. `NotFound`
/// when the journey does not exist.
async fn lock_journey(tx: &mut Transaction<'_, Postgres>, journey_id: Uuid) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM journeys WHERE id = $1 FOR UPDATE")
        .bind(journey_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(())
}

async fn lesson_slots(
    tx: &mut Transaction<'_, Postgres>,
    journey_id: Uuid,
) -> AppResult<Vec<LessonSlot>> {
    let rows = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT id, order_number FROM lessons WHERE journey_id = $1 ORDER BY order_number",
    )
    .bind(journey_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, order_number)| LessonSlot { id, order_number })
        .collect())
}

async fn set_order(
    tx: &mut Transaction<'_, Postgres>,
    lesson_id: Uuid,
    order_number: i32,
) -> AppResult<()> {
    sqlx::query("UPDATE lessons SET order_number = $2, updated_at = NOW() WHERE id = $1")
        .bind(lesson_id)
        .bind(order_number)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn get_credentials_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, name, email, role, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(creds)
    }

    async fn get_credentials(&self, id: Uuid) -> AppResult<Option<UserCredentials>> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, name, email, role, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(creds)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// The unique constraint on `users.email` is the source of truth for
    /// duplicates; its violation maps to `Conflict(DuplicateEmail)`.
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// update_user
    ///
    /// Full admin update. `COALESCE` keeps the stored hash when no new
    /// password is supplied.
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, email = $3, role = $4, \
             password_hash = COALESCE($5, password_hash), updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(update.role)
        .bind(update.password_hash.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_profile_name(&self, id: Uuid, name: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_journey(&self, id: Uuid) -> AppResult<Option<Journey>> {
        let journey = sqlx::query_as::<_, Journey>(&format!(
            "SELECT {JOURNEY_COLUMNS} FROM journeys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(journey)
    }

    async fn list_available_journeys(&self, user_id: Uuid) -> AppResult<Vec<JourneySummary>> {
        let journeys = sqlx::query_as::<_, JourneySummary>(
            r#"
            SELECT j.id, j.title, j.description, j.thumbnail_path, j.is_published
            FROM journeys j
            WHERE j.is_published = true
              AND NOT EXISTS (
                  SELECT 1 FROM enrollments e
                  WHERE e.journey_id = j.id AND e.user_id = $1
              )
            ORDER BY j.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(journeys)
    }

    async fn list_enrolled_journeys(&self, user_id: Uuid) -> AppResult<Vec<JourneySummary>> {
        let journeys = sqlx::query_as::<_, JourneySummary>(
            r#"
            SELECT j.id, j.title, j.description, j.thumbnail_path, j.is_published
            FROM journeys j
            JOIN enrollments e ON e.journey_id = j.id
            WHERE e.user_id = $1 AND j.is_published = true
            ORDER BY e.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(journeys)
    }

    async fn list_teacher_journeys(&self, teacher_id: Uuid) -> AppResult<Vec<Journey>> {
        let journeys = sqlx::query_as::<_, Journey>(&format!(
            "SELECT {JOURNEY_COLUMNS} FROM journeys WHERE teacher_id = $1 ORDER BY created_at DESC"
        ))
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(journeys)
    }

    /// create_journey
    ///
    /// New journeys always start unpublished.
    async fn create_journey(
        &self,
        teacher_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Journey> {
        let journey = sqlx::query_as::<_, Journey>(&format!(
            "INSERT INTO journeys (id, title, description, teacher_id, is_published, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, false, NOW(), NOW()) RETURNING {JOURNEY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(journey)
    }

    async fn update_journey(
        &self,
        id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Option<Journey>> {
        let journey = sqlx::query_as::<_, Journey>(&format!(
            "UPDATE journeys SET title = $2, description = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {JOURNEY_COLUMNS}"
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(journey)
    }

    async fn set_journey_published(
        &self,
        id: Uuid,
        published: bool,
    ) -> AppResult<Option<Journey>> {
        let journey = sqlx::query_as::<_, Journey>(&format!(
            "UPDATE journeys SET is_published = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {JOURNEY_COLUMNS}"
        ))
        .bind(id)
        .bind(published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(journey)
    }

    async fn set_journey_thumbnail(
        &self,
        id: Uuid,
        path: Option<String>,
    ) -> AppResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, Option<String>>(
            "SELECT thumbnail_path FROM journeys WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        sqlx::query("UPDATE journeys SET thumbnail_path = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(path.as_deref())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    /// delete_journey
    ///
    /// Collects the blob references of the journey, its lessons and their pdf
    /// materials before the cascading delete, all inside one transaction.
    async fn delete_journey(&self, id: Uuid) -> AppResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let thumbnail = sqlx::query_scalar::<_, Option<String>>(
            "SELECT thumbnail_path FROM journeys WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        let mut blobs: Vec<String> = sqlx::query_scalar::<_, String>(
            r#"
            SELECT video_path FROM lessons
            WHERE journey_id = $1 AND video_path IS NOT NULL
            UNION ALL
            SELECT m.content FROM materials m
            JOIN lessons l ON l.id = m.lesson_id
            WHERE l.journey_id = $1 AND m.material_type = 'pdf'
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        blobs.extend(thumbnail);

        sqlx::query("DELETE FROM journeys WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(blobs)
    }

    async fn list_lessons(&self, journey_id: Uuid) -> AppResult<Vec<Lesson>> {
        let lessons = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE journey_id = $1 ORDER BY order_number ASC"
        ))
        .bind(journey_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lessons)
    }

    async fn lesson_outline(
        &self,
        journey_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<LessonOutline>> {
        let outline = sqlx::query_as::<_, LessonOutline>(
            r#"
            SELECT l.id, l.title, l.description, l.order_number,
                   COALESCE(p.completed, false) AS completed
            FROM lessons l
            LEFT JOIN progress p ON p.lesson_id = l.id AND p.user_id = $2
            WHERE l.journey_id = $1
            ORDER BY l.order_number ASC
            "#,
        )
        .bind(journey_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(outline)
    }

    async fn get_lesson(&self, journey_id: Uuid, lesson_id: Uuid) -> AppResult<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1 AND journey_id = $2"
        ))
        .bind(lesson_id)
        .bind(journey_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(lesson)
    }

    /// append_lesson
    ///
    /// Reads the current slots under the journey lock, so two concurrent
    /// appends can never pick the same order number.
    async fn append_lesson(
        &self,
        journey_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Lesson> {
        let mut tx = self.pool.begin().await?;
        lock_journey(&mut tx, journey_id).await?;

        let slots = lesson_slots(&mut tx, journey_id).await?;
        let order_number = ordering::next_order(&slots);

        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            "INSERT INTO lessons (id, journey_id, title, description, order_number, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING {LESSON_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(journey_id)
        .bind(title)
        .bind(description)
        .bind(order_number)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(lesson)
    }

    async fn update_lesson(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            "UPDATE lessons SET title = $3, description = $4, updated_at = NOW() \
             WHERE id = $1 AND journey_id = $2 RETURNING {LESSON_COLUMNS}"
        ))
        .bind(lesson_id)
        .bind(journey_id)
        .bind(title)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(lesson)
    }

    /// move_lesson
    ///
    /// Both updates run in the same transaction. The deferred unique
    /// constraint on `(journey_id, order_number)` is only checked at commit.
    async fn move_lesson(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        direction: Direction,
    ) -> AppResult<Vec<Lesson>> {
        let mut tx = self.pool.begin().await?;
        lock_journey(&mut tx, journey_id).await?;

        let slots = lesson_slots(&mut tx, journey_id).await?;
        let swap = ordering::plan_move(&slots, lesson_id, direction)?;

        set_order(&mut tx, swap.moving, swap.neighbour_order).await?;
        set_order(&mut tx, swap.neighbour, swap.moving_order).await?;

        let lessons = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE journey_id = $1 ORDER BY order_number ASC"
        ))
        .bind(journey_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(%journey_id, %lesson_id, %direction, "lesson moved");
        Ok(lessons)
    }

    /// delete_lesson
    ///
    /// Materials cascade with the lesson. Survivors are renumbered in the same
    /// transaction so the journey never commits with a gap.
    async fn delete_lesson(&self, journey_id: Uuid, lesson_id: Uuid) -> AppResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        lock_journey(&mut tx, journey_id).await?;

        let video = sqlx::query_scalar::<_, Option<String>>(
            "SELECT video_path FROM lessons WHERE id = $1 AND journey_id = $2",
        )
        .bind(lesson_id)
        .bind(journey_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        let mut blobs = sqlx::query_scalar::<_, String>(
            "SELECT content FROM materials WHERE lesson_id = $1 AND material_type = 'pdf'",
        )
        .bind(lesson_id)
        .fetch_all(&mut *tx)
        .await?;
        blobs.extend(video);

        sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?;

        let survivors = lesson_slots(&mut tx, journey_id).await?;
        for slot in ordering::plan_renumber(&survivors) {
            set_order(&mut tx, slot.id, slot.order_number).await?;
        }

        tx.commit().await?;
        Ok(blobs)
    }

    async fn set_lesson_video(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        path: Option<String>,
    ) -> AppResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, Option<String>>(
            "SELECT video_path FROM lessons WHERE id = $1 AND journey_id = $2 FOR UPDATE",
        )
        .bind(lesson_id)
        .bind(journey_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        sqlx::query("UPDATE lessons SET video_path = $2, updated_at = NOW() WHERE id = $1")
            .bind(lesson_id)
            .bind(path.as_deref())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn list_materials(&self, lesson_id: Uuid) -> AppResult<Vec<Material>> {
        let materials = sqlx::query_as::<_, Material>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials WHERE lesson_id = $1 ORDER BY created_at ASC"
        ))
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(materials)
    }

    async fn add_material(&self, lesson_id: Uuid, material: NewMaterial) -> AppResult<Material> {
        let created = sqlx::query_as::<_, Material>(&format!(
            "INSERT INTO materials (id, lesson_id, title, material_type, content, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(lesson_id)
        .bind(&material.title)
        .bind(material.material_type)
        .bind(&material.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn delete_material(
        &self,
        lesson_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Material>> {
        let removed = sqlx::query_as::<_, Material>(&format!(
            "DELETE FROM materials WHERE id = $1 AND lesson_id = $2 RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(material_id)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(removed)
    }

    async fn is_enrolled(&self, user_id: Uuid, journey_id: Uuid) -> AppResult<bool> {
        let enrolled = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND journey_id = $2)",
        )
        .bind(user_id)
        .bind(journey_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrolled)
    }

    /// enroll
    ///
    /// `ON CONFLICT DO NOTHING` makes a racing second insert return no row
    /// instead of failing.
    async fn enroll(&self, user_id: Uuid, journey_id: Uuid) -> AppResult<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (user_id, journey_id, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id, journey_id) DO NOTHING \
             RETURNING user_id, journey_id, created_at",
        )
        .bind(user_id)
        .bind(journey_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment)
    }

    async fn get_progress(&self, user_id: Uuid, lesson_id: Uuid) -> AppResult<Option<Progress>> {
        let progress = sqlx::query_as::<_, Progress>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id = $1 AND lesson_id = $2"
        ))
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(progress)
    }

    async fn apply_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        event: ProgressEvent,
    ) -> AppResult<Progress> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO progress (user_id, lesson_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, lesson_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

        let current = sqlx::query_as::<_, Progress>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress \
             WHERE user_id = $1 AND lesson_id = $2 FOR UPDATE"
        ))
        .bind(user_id)
        .bind(lesson_id)
        .fetch_one(&mut *tx)
        .await?;

        let before = ProgressState::of(Some(&current));
        let after = before.apply(event);
        if after == before {
            tx.commit().await?;
            return Ok(current);
        }

        let progress = sqlx::query_as::<_, Progress>(&format!(
            "UPDATE progress SET completed = $3, last_watched_position = $4, updated_at = NOW() \
             WHERE user_id = $1 AND lesson_id = $2 \
             RETURNING {PROGRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(lesson_id)
        .bind(after.is_completed())
        .bind(after.position())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(progress)
    }
}
