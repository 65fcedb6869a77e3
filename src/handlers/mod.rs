//! HTTP handlers, grouped by the audience of the route.

pub mod admin;
pub mod auth;
pub mod files;
pub mod student;
pub mod teacher;

use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request, multipart::MultipartRejection};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Lesson,
    repository::Repository,
    storage::{self, StorageService, Upload},
};

/// Lowercased, trimmed email. Emails are compared in this form everywhere.
pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::validation("email must be a valid address"));
    }
    Ok(email)
}

/// Fetches a lesson scoped to its journey. A lesson id under the wrong
/// journey is indistinguishable from a missing one.
pub(crate) async fn lesson_in_journey(
    repo: &dyn Repository,
    journey_id: Uuid,
    lesson_id: Uuid,
) -> AppResult<Lesson> {
    repo.get_lesson(journey_id, lesson_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// Deletes blobs whose references are already gone, logging failures.
pub(crate) async fn discard_blobs(storage: &dyn StorageService, keys: Vec<String>) {
    if !keys.is_empty() {
        storage::delete_blobs_best_effort(storage, &keys).await;
    }
}

/// MultipartForm
///
/// Text fields plus at most one file (field `file`) of a multipart request.
/// Used directly as an extractor; a body that is not multipart is a
/// `validation_error`.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e: MultipartRejection| {
                AppError::validation(format!("expected a multipart body: {}", e.body_text()))
            })?;
        Self::read(multipart).await
    }
}

impl MultipartForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::validation(format!("failed to read file: {e}")))?
                        .to_vec();
                    form.file = Some(Upload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                "" => {}
                _ => {
                    let value = field.text().await.map_err(|e| {
                        AppError::validation(format!("failed to read field {name}: {e}"))
                    })?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn take_file(&mut self) -> AppResult<Upload> {
        self.file
            .take()
            .ok_or_else(|| AppError::validation("file is required"))
    }

    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }
}
