#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use learning_portal::{
    AppState,
    auth::{self, AuthUser},
    config::AppConfig,
    error::{AppError, AppResult, ConflictKind},
    models::{
        Enrollment, Journey, JourneySummary, Lesson, LessonOutline, Material, MaterialType,
        NewMaterial, NewUser, Progress, Role, User, UserCredentials, UserUpdate,
    },
    ordering::{self, Direction, LessonSlot},
    repository::{Repository, RepositoryState},
    storage::{MockStorageService, StorageState},
    tracker::{ProgressEvent, ProgressState},
};
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

#[derive(Default)]
struct Store {
    users: Vec<(User, String)>,
    journeys: Vec<Journey>,
    lessons: Vec<Lesson>,
    materials: Vec<Material>,
    enrollments: Vec<Enrollment>,
    progress: Vec<Progress>,
}

impl Store {
    fn slots(&self, journey_id: Uuid) -> Vec<LessonSlot> {
        self.lessons
            .iter()
            .filter(|l| l.journey_id == journey_id)
            .map(|l| LessonSlot {
                id: l.id,
                order_number: l.order_number,
            })
            .collect()
    }

    fn ordered_lessons(&self, journey_id: Uuid) -> Vec<Lesson> {
        let mut lessons: Vec<Lesson> = self
            .lessons
            .iter()
            .filter(|l| l.journey_id == journey_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.order_number);
        lessons
    }

    fn remove_lesson_cascade(&mut self, lesson_id: Uuid) -> Vec<String> {
        let mut blobs: Vec<String> = self
            .materials
            .iter()
            .filter(|m| m.lesson_id == lesson_id && m.material_type == MaterialType::Pdf)
            .map(|m| m.content.clone())
            .collect();
        if let Some(lesson) = self.lessons.iter().find(|l| l.id == lesson_id) {
            blobs.extend(lesson.video_path.clone());
        }
        self.materials.retain(|m| m.lesson_id != lesson_id);
        self.progress.retain(|p| p.lesson_id != lesson_id);
        self.lessons.retain(|l| l.id != lesson_id);
        blobs
    }

    fn remove_journey_cascade(&mut self, journey_id: Uuid) -> Vec<String> {
        let lesson_ids: Vec<Uuid> = self
            .lessons
            .iter()
            .filter(|l| l.journey_id == journey_id)
            .map(|l| l.id)
            .collect();
        let mut blobs = Vec::new();
        for lesson_id in lesson_ids {
            blobs.extend(self.remove_lesson_cascade(lesson_id));
        }
        if let Some(journey) = self.journeys.iter().find(|j| j.id == journey_id) {
            blobs.extend(journey.thumbnail_path.clone());
        }
        self.enrollments.retain(|e| e.journey_id != journey_id);
        self.journeys.retain(|j| j.id != journey_id);
        blobs
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|(u, _)| u.email == email && Some(u.id) != except)
    }
}

/// InMemoryRepository
///
/// `Repository` over plain vectors with the same cascade, uniqueness and
/// ordering behaviour as the Postgres schema.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut store = self.store.lock().expect("store lock poisoned");
        f(&mut store)
    }

    pub fn seed_user(&self, name: &str, role: Role) -> User {
        self.seed_user_with_hash(name, role, "not-a-valid-hash")
    }

    pub fn seed_user_with_password(&self, name: &str, role: Role, password: &str) -> User {
        let hash = auth::hash_password(password).expect("hashing works in tests");
        self.seed_user_with_hash(name, role, &hash)
    }

    fn seed_user_with_hash(&self, name: &str, role: Role, hash: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@portal.test", name.to_lowercase().replace(' ', ".")),
            role,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.users.push((user.clone(), hash.to_string())));
        user
    }

    pub fn seed_journey(&self, teacher: &User, title: &str, published: bool) -> Journey {
        let now = Utc::now();
        let journey = Journey {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            thumbnail_path: None,
            teacher_id: teacher.id,
            is_published: published,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.journeys.push(journey.clone()));
        journey
    }

    pub fn seed_enrollment(&self, user: &User, journey: &Journey) {
        self.with(|s| {
            s.enrollments.push(Enrollment {
                user_id: user.id,
                journey_id: journey.id,
                created_at: Utc::now(),
            })
        });
    }

    pub fn set_video_path(&self, lesson_id: Uuid, path: &str) {
        self.with(|s| {
            if let Some(lesson) = s.lessons.iter_mut().find(|l| l.id == lesson_id) {
                lesson.video_path = Some(path.to_string());
            }
        });
    }

    pub fn lessons_of(&self, journey_id: Uuid) -> Vec<Lesson> {
        self.with(|s| s.ordered_lessons(journey_id))
    }

    pub fn titles_in_order(&self, journey_id: Uuid) -> Vec<String> {
        self.lessons_of(journey_id)
            .into_iter()
            .map(|l| l.title)
            .collect()
    }

    pub fn slots_of(&self, journey_id: Uuid) -> Vec<LessonSlot> {
        self.with(|s| s.slots(journey_id))
    }

    pub fn enrollment_count(&self, user_id: Uuid, journey_id: Uuid) -> usize {
        self.with(|s| {
            s.enrollments
                .iter()
                .filter(|e| e.user_id == user_id && e.journey_id == journey_id)
                .count()
        })
    }

    pub fn progress_rows(&self, user_id: Uuid) -> Vec<Progress> {
        self.with(|s| {
            s.progress
                .iter()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    pub fn user_count(&self) -> usize {
        self.with(|s| s.users.len())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.with(|s| s.users.iter().find(|(u, _)| u.id == id).map(|(u, _)| u.clone())))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.with(|s| s.users.iter().map(|(u, _)| u.clone()).collect()))
    }

    async fn get_credentials_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        Ok(self.with(|s| {
            s.users
                .iter()
                .find(|(u, _)| u.email == email)
                .map(|(u, hash)| credentials(u, hash))
        }))
    }

    async fn get_credentials(&self, id: Uuid) -> AppResult<Option<UserCredentials>> {
        Ok(self.with(|s| {
            s.users
                .iter()
                .find(|(u, _)| u.id == id)
                .map(|(u, hash)| credentials(u, hash))
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.with(|s| {
            s.users
                .iter()
                .find(|(u, _)| u.email == email)
                .map(|(u, _)| u.clone())
        }))
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        self.with(|s| -> AppResult<User> {
            if s.email_taken(&user.email, None) {
                return Err(AppError::Conflict(ConflictKind::DuplicateEmail));
            }
            let now = Utc::now();
            let created = User {
                id: Uuid::new_v4(),
                name: user.name,
                email: user.email,
                role: user.role,
                created_at: now,
                updated_at: now,
            };
            s.users.push((created.clone(), user.password_hash));
            Ok(created)
        })
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> AppResult<Option<User>> {
        self.with(|s| -> AppResult<Option<User>> {
            if s.email_taken(&update.email, Some(id)) {
                return Err(AppError::Conflict(ConflictKind::DuplicateEmail));
            }
            let Some((user, hash)) = s.users.iter_mut().find(|(u, _)| u.id == id) else {
                return Ok(None);
            };
            user.name = update.name;
            user.email = update.email;
            user.role = update.role;
            user.updated_at = Utc::now();
            if let Some(new_hash) = update.password_hash {
                *hash = new_hash;
            }
            Ok(Some(user.clone()))
        })
    }

    async fn update_profile_name(&self, id: Uuid, name: &str) -> AppResult<Option<User>> {
        Ok(self.with(|s| {
            s.users.iter_mut().find(|(u, _)| u.id == id).map(|(u, _)| {
                u.name = name.to_string();
                u.updated_at = Utc::now();
                u.clone()
            })
        }))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<bool> {
        Ok(self.with(|s| {
            match s.users.iter_mut().find(|(u, _)| u.id == id) {
                Some((_, hash)) => {
                    *hash = password_hash.to_string();
                    true
                }
                None => false,
            }
        }))
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.with(|s| {
            let before = s.users.len();
            s.users.retain(|(u, _)| u.id != id);
            if s.users.len() == before {
                return false;
            }
            let owned: Vec<Uuid> = s
                .journeys
                .iter()
                .filter(|j| j.teacher_id == id)
                .map(|j| j.id)
                .collect();
            for journey_id in owned {
                s.remove_journey_cascade(journey_id);
            }
            s.enrollments.retain(|e| e.user_id != id);
            s.progress.retain(|p| p.user_id != id);
            true
        }))
    }

    async fn get_journey(&self, id: Uuid) -> AppResult<Option<Journey>> {
        Ok(self.with(|s| s.journeys.iter().find(|j| j.id == id).cloned()))
    }

    async fn list_available_journeys(&self, user_id: Uuid) -> AppResult<Vec<JourneySummary>> {
        Ok(self.with(|s| {
            s.journeys
                .iter()
                .filter(|j| j.is_published)
                .filter(|j| {
                    !s.enrollments
                        .iter()
                        .any(|e| e.user_id == user_id && e.journey_id == j.id)
                })
                .cloned()
                .map(JourneySummary::from)
                .collect()
        }))
    }

    async fn list_enrolled_journeys(&self, user_id: Uuid) -> AppResult<Vec<JourneySummary>> {
        Ok(self.with(|s| {
            s.journeys
                .iter()
                .filter(|j| j.is_published)
                .filter(|j| {
                    s.enrollments
                        .iter()
                        .any(|e| e.user_id == user_id && e.journey_id == j.id)
                })
                .cloned()
                .map(JourneySummary::from)
                .collect()
        }))
    }

    async fn list_teacher_journeys(&self, teacher_id: Uuid) -> AppResult<Vec<Journey>> {
        Ok(self.with(|s| {
            s.journeys
                .iter()
                .filter(|j| j.teacher_id == teacher_id)
                .cloned()
                .collect()
        }))
    }

    async fn create_journey(
        &self,
        teacher_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Journey> {
        let now = Utc::now();
        let journey = Journey {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            thumbnail_path: None,
            teacher_id,
            is_published: false,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.journeys.push(journey.clone()));
        Ok(journey)
    }

    async fn update_journey(
        &self,
        id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Option<Journey>> {
        Ok(self.with(|s| {
            s.journeys.iter_mut().find(|j| j.id == id).map(|j| {
                j.title = title.to_string();
                j.description = description.to_string();
                j.updated_at = Utc::now();
                j.clone()
            })
        }))
    }

    async fn set_journey_published(
        &self,
        id: Uuid,
        published: bool,
    ) -> AppResult<Option<Journey>> {
        Ok(self.with(|s| {
            s.journeys.iter_mut().find(|j| j.id == id).map(|j| {
                j.is_published = published;
                j.clone()
            })
        }))
    }

    async fn set_journey_thumbnail(
        &self,
        id: Uuid,
        path: Option<String>,
    ) -> AppResult<Option<String>> {
        self.with(|s| -> AppResult<Option<String>> {
            let journey = s
                .journeys
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or(AppError::NotFound)?;
            Ok(std::mem::replace(&mut journey.thumbnail_path, path))
        })
    }

    async fn delete_journey(&self, id: Uuid) -> AppResult<Vec<String>> {
        self.with(|s| -> AppResult<Vec<String>> {
            if !s.journeys.iter().any(|j| j.id == id) {
                return Err(AppError::NotFound);
            }
            Ok(s.remove_journey_cascade(id))
        })
    }

    async fn list_lessons(&self, journey_id: Uuid) -> AppResult<Vec<Lesson>> {
        Ok(self.with(|s| s.ordered_lessons(journey_id)))
    }

    async fn lesson_outline(
        &self,
        journey_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<LessonOutline>> {
        Ok(self.with(|s| {
            s.ordered_lessons(journey_id)
                .into_iter()
                .map(|l| LessonOutline {
                    completed: s
                        .progress
                        .iter()
                        .any(|p| p.user_id == user_id && p.lesson_id == l.id && p.completed),
                    id: l.id,
                    title: l.title,
                    description: l.description,
                    order_number: l.order_number,
                })
                .collect()
        }))
    }

    async fn get_lesson(&self, journey_id: Uuid, lesson_id: Uuid) -> AppResult<Option<Lesson>> {
        Ok(self.with(|s| {
            s.lessons
                .iter()
                .find(|l| l.id == lesson_id && l.journey_id == journey_id)
                .cloned()
        }))
    }

    async fn append_lesson(
        &self,
        journey_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Lesson> {
        self.with(|s| -> AppResult<Lesson> {
            if !s.journeys.iter().any(|j| j.id == journey_id) {
                return Err(AppError::NotFound);
            }
            let now = Utc::now();
            let lesson = Lesson {
                id: Uuid::new_v4(),
                journey_id,
                title: title.to_string(),
                description: description.to_string(),
                video_path: None,
                order_number: ordering::next_order(&s.slots(journey_id)),
                created_at: now,
                updated_at: now,
            };
            s.lessons.push(lesson.clone());
            Ok(lesson)
        })
    }

    async fn update_lesson(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Option<Lesson>> {
        Ok(self.with(|s| {
            s.lessons
                .iter_mut()
                .find(|l| l.id == lesson_id && l.journey_id == journey_id)
                .map(|l| {
                    l.title = title.to_string();
                    l.description = description.to_string();
                    l.clone()
                })
        }))
    }

    async fn move_lesson(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        direction: Direction,
    ) -> AppResult<Vec<Lesson>> {
        self.with(|s| -> AppResult<Vec<Lesson>> {
            let swap = ordering::plan_move(&s.slots(journey_id), lesson_id, direction)?;
            for lesson in s.lessons.iter_mut() {
                if lesson.id == swap.moving {
                    lesson.order_number = swap.neighbour_order;
                } else if lesson.id == swap.neighbour {
                    lesson.order_number = swap.moving_order;
                }
            }
            Ok(s.ordered_lessons(journey_id))
        })
    }

    async fn delete_lesson(&self, journey_id: Uuid, lesson_id: Uuid) -> AppResult<Vec<String>> {
        self.with(|s| -> AppResult<Vec<String>> {
            if !s
                .lessons
                .iter()
                .any(|l| l.id == lesson_id && l.journey_id == journey_id)
            {
                return Err(AppError::NotFound);
            }
            let blobs = s.remove_lesson_cascade(lesson_id);
            for slot in ordering::plan_renumber(&s.slots(journey_id)) {
                if let Some(lesson) = s.lessons.iter_mut().find(|l| l.id == slot.id) {
                    lesson.order_number = slot.order_number;
                }
            }
            Ok(blobs)
        })
    }

    async fn set_lesson_video(
        &self,
        journey_id: Uuid,
        lesson_id: Uuid,
        path: Option<String>,
    ) -> AppResult<Option<String>> {
        self.with(|s| -> AppResult<Option<String>> {
            let lesson = s
                .lessons
                .iter_mut()
                .find(|l| l.id == lesson_id && l.journey_id == journey_id)
                .ok_or(AppError::NotFound)?;
            Ok(std::mem::replace(&mut lesson.video_path, path))
        })
    }

    async fn list_materials(&self, lesson_id: Uuid) -> AppResult<Vec<Material>> {
        Ok(self.with(|s| {
            s.materials
                .iter()
                .filter(|m| m.lesson_id == lesson_id)
                .cloned()
                .collect()
        }))
    }

    async fn add_material(&self, lesson_id: Uuid, material: NewMaterial) -> AppResult<Material> {
        let created = Material {
            id: Uuid::new_v4(),
            lesson_id,
            title: material.title,
            material_type: material.material_type,
            content: material.content,
            created_at: Utc::now(),
        };
        self.with(|s| s.materials.push(created.clone()));
        Ok(created)
    }

    async fn delete_material(
        &self,
        lesson_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Material>> {
        Ok(self.with(|s| -> Option<Material> {
            let index = s
                .materials
                .iter()
                .position(|m| m.id == material_id && m.lesson_id == lesson_id)?;
            Some(s.materials.remove(index))
        }))
    }

    async fn is_enrolled(&self, user_id: Uuid, journey_id: Uuid) -> AppResult<bool> {
        Ok(self.with(|s| {
            s.enrollments
                .iter()
                .any(|e| e.user_id == user_id && e.journey_id == journey_id)
        }))
    }

    async fn enroll(&self, user_id: Uuid, journey_id: Uuid) -> AppResult<Option<Enrollment>> {
        Ok(self.with(|s| {
            if s.enrollments
                .iter()
                .any(|e| e.user_id == user_id && e.journey_id == journey_id)
            {
                return None;
            }
            let enrollment = Enrollment {
                user_id,
                journey_id,
                created_at: Utc::now(),
            };
            s.enrollments.push(enrollment.clone());
            Some(enrollment)
        }))
    }

    async fn get_progress(&self, user_id: Uuid, lesson_id: Uuid) -> AppResult<Option<Progress>> {
        Ok(self.with(|s| {
            s.progress
                .iter()
                .find(|p| p.user_id == user_id && p.lesson_id == lesson_id)
                .cloned()
        }))
    }

    async fn apply_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        event: ProgressEvent,
    ) -> AppResult<Progress> {
        Ok(self.with(|s| apply_progress_event(s, user_id, lesson_id, event)))
    }
}

fn credentials(user: &User, hash: &str) -> UserCredentials {
    UserCredentials {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        password_hash: hash.to_string(),
    }
}

fn apply_progress_event(
    s: &mut Store,
    user_id: Uuid,
    lesson_id: Uuid,
    event: ProgressEvent,
) -> Progress {
    let index = match s
        .progress
        .iter()
        .position(|p| p.user_id == user_id && p.lesson_id == lesson_id)
    {
        Some(index) => index,
        None => {
            s.progress.push(Progress {
                user_id,
                lesson_id,
                completed: false,
                last_watched_position: 0,
                updated_at: Utc::now(),
            });
            s.progress.len() - 1
        }
    };
    let row = &mut s.progress[index];
    let before = ProgressState::of(Some(&*row));
    let after = before.apply(event);
    if after != before {
        row.completed = after.is_completed();
        row.last_watched_position = after.position();
        row.updated_at = Utc::now();
    }
    row.clone()
}

// --- STATE HELPERS ---

pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
    pub state: AppState,
}

pub fn test_context() -> TestContext {
    test_context_with(MockStorageService::new(), AppConfig::default())
}

pub fn test_context_with(storage: MockStorageService, config: AppConfig) -> TestContext {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(storage.clone()) as StorageState,
        config,
    };
    TestContext {
        repo,
        storage,
        state,
    }
}

pub fn as_auth(user: &User) -> AuthUser {
    AuthUser::from(user.clone())
}

pub fn bearer(user: &User, config: &AppConfig) -> String {
    let token = auth::issue_token(user, &config.jwt_secret, config.jwt_ttl_secs)
        .expect("token signing works in tests");
    format!("Bearer {token}")
}
