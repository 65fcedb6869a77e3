//! Runs against a real Postgres. Set `DATABASE_URL` and run with
//! `cargo test -- --ignored`.

use learning_portal::{
    error::{AppError, ConflictKind},
    models::{MaterialType, NewMaterial, NewUser, Role, User, UserUpdate},
    ordering::{Direction, LessonSlot, is_dense},
    repository::{PostgresRepository, Repository},
    tracker::ProgressEvent,
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Every user gets a fresh email so tests can share one database.
async fn create_test_user(repo: &PostgresRepository, role: Role) -> User {
    repo.create_user(NewUser {
        name: format!("{role} {}", Uuid::new_v4().simple()),
        email: format!("{role}-{}@portal.test", Uuid::new_v4().simple()),
        password_hash: "not-a-real-hash".to_string(),
        role,
    })
    .await
    .expect("Failed to create test user")
}

async fn slots(repo: &PostgresRepository, journey_id: Uuid) -> Vec<LessonSlot> {
    repo.list_lessons(journey_id)
        .await
        .expect("list lessons")
        .into_iter()
        .map(|l| LessonSlot {
            id: l.id,
            order_number: l.order_number,
        })
        .collect()
}

// --- Users ---

#[tokio::test]
#[ignore]
async fn test_duplicate_email_is_conflict() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let existing = create_test_user(&repo, Role::Student).await;

    let result = repo
        .create_user(NewUser {
            name: "Copy".to_string(),
            email: existing.email.clone(),
            password_hash: "x".to_string(),
            role: Role::Student,
        })
        .await;
    assert_eq!(
        result.err(),
        Some(AppError::Conflict(ConflictKind::DuplicateEmail))
    );

    let other = create_test_user(&repo, Role::Student).await;
    let update = repo
        .update_user(
            other.id,
            UserUpdate {
                name: other.name.clone(),
                email: existing.email.clone(),
                role: other.role,
                password_hash: None,
            },
        )
        .await;
    assert_eq!(
        update.err(),
        Some(AppError::Conflict(ConflictKind::DuplicateEmail))
    );
}

#[tokio::test]
#[ignore]
async fn test_password_hash_update_keeps_profile() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Teacher).await;

    assert!(repo.set_password_hash(user.id, "new-hash").await.expect("update"));
    let creds = repo
        .get_credentials(user.id)
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(creds.password_hash, "new-hash");
    assert_eq!(creds.email, user.email);

    assert!(!repo.set_password_hash(Uuid::new_v4(), "x").await.expect("update"));
}

// --- Lesson ordering ---

#[tokio::test]
#[ignore]
async fn test_lesson_ordering_lifecycle() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let teacher = create_test_user(&repo, Role::Teacher).await;
    let journey = repo
        .create_journey(teacher.id, "Ordering", "")
        .await
        .expect("create journey");

    let a = repo.append_lesson(journey.id, "A", "").await.expect("append");
    let b = repo.append_lesson(journey.id, "B", "").await.expect("append");
    let c = repo.append_lesson(journey.id, "C", "").await.expect("append");
    assert_eq!((a.order_number, b.order_number, c.order_number), (1, 2, 3));

    let moved = repo
        .move_lesson(journey.id, a.id, Direction::Down)
        .await
        .expect("move A down");
    let ids: Vec<Uuid> = moved.iter().map(|l| l.id).collect();
    assert_eq!(ids, [b.id, a.id, c.id]);

    let boundary = repo.move_lesson(journey.id, c.id, Direction::Down).await;
    assert_eq!(boundary.err(), Some(AppError::Boundary));

    repo.delete_lesson(journey.id, a.id).await.expect("delete A");
    let remaining = slots(&repo, journey.id).await;
    assert!(is_dense(&remaining));
    assert_eq!(
        remaining.iter().map(|s| s.id).collect::<Vec<_>>(),
        [b.id, c.id]
    );

    let d = repo.append_lesson(journey.id, "D", "").await.expect("append");
    assert_eq!(d.order_number, 3);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_appends_stay_dense() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let teacher = create_test_user(&repo, Role::Teacher).await;
    let journey = repo
        .create_journey(teacher.id, "Concurrent", "")
        .await
        .expect("create journey");

    let mut handles = Vec::new();
    for i in 0..8 {
        let repo = ctx.repository();
        let journey_id = journey.id;
        handles.push(tokio::spawn(async move {
            repo.append_lesson(journey_id, &format!("Lesson {i}"), "")
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("task").expect("append");
    }

    let all = slots(&repo, journey.id).await;
    assert_eq!(all.len(), 8);
    assert!(is_dense(&all));
}

// --- Blob references ---

#[tokio::test]
#[ignore]
async fn test_delete_journey_returns_blob_references() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let teacher = create_test_user(&repo, Role::Teacher).await;
    let journey = repo
        .create_journey(teacher.id, "Blobs", "")
        .await
        .expect("create journey");
    let lesson = repo.append_lesson(journey.id, "A", "").await.expect("append");

    let cover = format!("journey-{}/cover/c.png", journey.id);
    let video = format!("journey-{}/lesson-{}/v.mp4", journey.id, lesson.id);
    let pdf = format!("journey-{}/lesson-{}/n.pdf", journey.id, lesson.id);

    assert_eq!(
        repo.set_journey_thumbnail(journey.id, Some(cover.clone()))
            .await
            .expect("thumbnail"),
        None
    );
    repo.set_lesson_video(journey.id, lesson.id, Some(video.clone()))
        .await
        .expect("video");
    repo.add_material(
        lesson.id,
        NewMaterial {
            title: "Notes".to_string(),
            material_type: MaterialType::Pdf,
            content: pdf.clone(),
        },
    )
    .await
    .expect("pdf");
    repo.add_material(
        lesson.id,
        NewMaterial {
            title: "Link".to_string(),
            material_type: MaterialType::Link,
            content: "https://example.com".to_string(),
        },
    )
    .await
    .expect("link");

    let mut blobs = repo.delete_journey(journey.id).await.expect("delete");
    blobs.sort();
    let mut expected = vec![cover, video, pdf];
    expected.sort();
    assert_eq!(blobs, expected);

    assert!(repo.get_journey(journey.id).await.expect("get").is_none());
    assert_eq!(repo.delete_journey(journey.id).await.err(), Some(AppError::NotFound));
}

// --- Enrollment and progress ---

#[tokio::test]
#[ignore]
async fn test_enrollment_and_progress_upserts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let teacher = create_test_user(&repo, Role::Teacher).await;
    let student = create_test_user(&repo, Role::Student).await;
    let journey = repo
        .create_journey(teacher.id, "Progress", "")
        .await
        .expect("create journey");
    repo.set_journey_published(journey.id, true)
        .await
        .expect("publish");
    let lesson = repo.append_lesson(journey.id, "A", "").await.expect("append");

    assert!(repo.enroll(student.id, journey.id).await.expect("enroll").is_some());
    assert!(repo.enroll(student.id, journey.id).await.expect("enroll").is_none());
    assert!(repo.is_enrolled(student.id, journey.id).await.expect("check"));

    let enrolled = repo.list_enrolled_journeys(student.id).await.expect("list");
    assert!(enrolled.iter().any(|j| j.id == journey.id));
    let available = repo.list_available_journeys(student.id).await.expect("list");
    assert!(!available.iter().any(|j| j.id == journey.id));

    let watched = repo
        .apply_progress(student.id, lesson.id, ProgressEvent::Watched { position: 42 })
        .await
        .expect("progress");
    assert_eq!(watched.last_watched_position, 42);
    assert!(!watched.completed);

    let done = repo
        .apply_progress(student.id, lesson.id, ProgressEvent::MarkedComplete)
        .await
        .expect("complete");
    assert!(done.completed);
    assert_eq!(done.last_watched_position, 42);

    let repeated = repo
        .apply_progress(student.id, lesson.id, ProgressEvent::MarkedComplete)
        .await
        .expect("complete again");
    assert_eq!(repeated, done);

    let again = repo
        .apply_progress(student.id, lesson.id, ProgressEvent::Watched { position: 5 })
        .await
        .expect("progress");
    assert!(again.completed);

    let outline = repo
        .lesson_outline(journey.id, student.id)
        .await
        .expect("outline");
    assert!(outline[0].completed);
}
