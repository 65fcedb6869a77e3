use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use uuid::Uuid;

use crate::{config::UploadLimits, error::AppError};

/// StorageError
///
/// Failures of upload validation and of the blob backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} uploads must be one of: {allowed}")]
    DisallowedType { kind: BlobKind, allowed: String },
    #[error("{kind} uploads may not exceed {limit} bytes")]
    TooLarge { kind: BlobKind, limit: u64 },
    #[error("the uploaded file is empty")]
    Empty,
    #[error("object not found")]
    NotFound,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DisallowedType { .. }
            | StorageError::TooLarge { .. }
            | StorageError::Empty => AppError::Validation(err.to_string()),
            StorageError::NotFound => AppError::NotFound,
            StorageError::Backend(detail) => AppError::Storage(detail),
        }
    }
}

// 1. StorageService Contract
/// StorageService
///
/// Byte-level contract of the blob store. Handlers never talk to a backend
/// directly: uploads go through [`store_upload`], downloads and deletes through
/// this trait, so S3, the local filesystem and the in-memory mock are
/// interchangeable behind `Arc<dyn StorageService>`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Provisions the bucket or root directory. Safe to call on every start.
    async fn ensure_bucket_exists(&self);

    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>)
    -> Result<(), StorageError>;

    /// `StorageError::NotFound` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// StorageState
///
/// Shared handle to the blob store inside `AppState`.
pub type StorageState = Arc<dyn StorageService>;

// 2. S3 / MinIO
/// S3StorageClient
///
/// `StorageService` over any S3-compatible endpoint. Path-style addressing is
/// forced because MinIO and most self-hosted gateways require it.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// CreateBucket on an existing bucket fails harmlessly, so the result is
    /// only logged.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket {}: {:?}", self.bucket_name, e);
        }
    }

    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("put_object: {e:?}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound
                } else {
                    StorageError::Backend(format!("get_object: {e:?}"))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("get_object body: {e:?}")))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("delete_object: {e:?}")))?;
        Ok(())
    }
}

// 3. Local filesystem
/// LocalStorage
///
/// Blobs as plain files below `root`. Used in local development when no
/// MinIO container is running.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            tracing::warn!("could not create storage root {:?}: {:?}", self.root, e);
        }
    }

    async fn put(
        &self,
        key: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Backend(format!("create_dir_all {parent:?}: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Backend(format!("write {path:?}: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Backend(format!("read {path:?}: {e}")),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Backend(format!("remove {path:?}: {e}"))),
        }
    }
}

// 4. In-memory mock (tests)
/// MockStorageService
///
/// Keeps objects in a shared map so tests can assert on what was stored or
/// deleted. With `should_fail` every operation returns a backend error.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, (String, Vec<u8>)>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(&sanitize_key(key)))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fail_if_requested(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (String, Vec<u8>)>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Backend("mock storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.fail_if_requested()?;
        self.lock()?
            .insert(sanitize_key(key), (content_type.to_string(), bytes));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.fail_if_requested()?;
        self.lock()?
            .get(&sanitize_key(key))
            .map(|(_, bytes)| bytes.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.fail_if_requested()?;
        self.lock()?.remove(&sanitize_key(key));
        Ok(())
    }
}

// --- Upload policy & key layout ---

/// BlobKind
///
/// What an upload is for. Each kind has its own MIME allow-list and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Video,
    Document,
    Image,
}

impl std::fmt::Display for BlobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BlobKind::Video => "video",
            BlobKind::Document => "document",
            BlobKind::Image => "image",
        })
    }
}

impl BlobKind {
    /// Accepted MIME types paired with the extension stored in the key.
    pub fn allowed_types(self) -> &'static [(&'static str, &'static str)] {
        match self {
            BlobKind::Video => &[
                ("video/mp4", "mp4"),
                ("video/webm", "webm"),
                ("video/ogg", "ogg"),
            ],
            BlobKind::Document => &[("application/pdf", "pdf")],
            BlobKind::Image => &[
                ("image/jpeg", "jpg"),
                ("image/png", "png"),
                ("image/webp", "webp"),
                ("image/gif", "gif"),
            ],
        }
    }

    pub fn limit(self, limits: &UploadLimits) -> Option<u64> {
        match self {
            BlobKind::Video => limits.max_video_bytes,
            BlobKind::Document => limits.max_document_bytes,
            BlobKind::Image => limits.max_image_bytes,
        }
    }

    fn extension_for(self, content_type: &str) -> Option<&'static str> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_types()
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, ext)| *ext)
    }
}

/// BlobOwner
///
/// The entity a blob belongs to. `lesson_id: None` means the journey cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobOwner {
    pub journey_id: Uuid,
    pub lesson_id: Option<Uuid>,
}

impl BlobOwner {
    pub fn cover(journey_id: Uuid) -> Self {
        Self {
            journey_id,
            lesson_id: None,
        }
    }

    pub fn lesson(journey_id: Uuid, lesson_id: Uuid) -> Self {
        Self {
            journey_id,
            lesson_id: Some(lesson_id),
        }
    }

    fn prefix(&self) -> String {
        match self.lesson_id {
            Some(lesson_id) => format!("journey-{}/lesson-{}", self.journey_id, lesson_id),
            None => format!("journey-{}/cover", self.journey_id),
        }
    }
}

/// Upload
///
/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Checks an upload against the kind's allow-list and size ceiling and
/// returns the key extension to use.
pub fn validate_upload(
    upload: &Upload,
    kind: BlobKind,
    limits: &UploadLimits,
) -> Result<&'static str, StorageError> {
    let extension =
        kind.extension_for(&upload.content_type)
            .ok_or_else(|| StorageError::DisallowedType {
                kind,
                allowed: kind
                    .allowed_types()
                    .iter()
                    .map(|(mime, _)| *mime)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

    if upload.bytes.is_empty() {
        return Err(StorageError::Empty);
    }

    if let Some(limit) = kind.limit(limits) {
        if upload.bytes.len() as u64 > limit {
            return Err(StorageError::TooLarge { kind, limit });
        }
    }

    Ok(extension)
}

/// Lowercased file stem reduced to `[a-z0-9-]`, never empty.
fn sanitize_stem(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    let mut cleaned = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            cleaned.push(c);
        } else if !cleaned.ends_with('-') {
            cleaned.push('-');
        }
    }

    let cleaned: String = cleaned.trim_matches('-').chars().take(48).collect();
    let cleaned = cleaned.trim_end_matches('-').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// build_key
///
/// `journey-{id}/lesson-{id}/{stem}-{uuid}.{ext}` or
/// `journey-{id}/cover/{stem}-{uuid}.{ext}`.
pub fn build_key(owner: &BlobOwner, file_name: &str, extension: &str) -> String {
    format!(
        "{}/{}-{}.{}",
        owner.prefix(),
        sanitize_stem(file_name),
        Uuid::new_v4(),
        extension
    )
}

/// store_upload
///
/// Validates, writes the blob and returns its key. Nothing is written when
/// validation fails.
pub async fn store_upload(
    storage: &dyn StorageService,
    limits: &UploadLimits,
    upload: Upload,
    owner: BlobOwner,
    kind: BlobKind,
) -> Result<String, StorageError> {
    let extension = validate_upload(&upload, kind, limits)?;
    let key = build_key(&owner, &upload.file_name, extension);

    storage.put(&key, &upload.content_type, upload.bytes).await?;
    tracing::info!(%key, %kind, "blob stored");
    Ok(key)
}

/// Deletes blobs after their references are gone. Failures only leave an
/// orphaned object behind, so they are logged and swallowed.
pub async fn delete_blobs_best_effort(storage: &dyn StorageService, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(%key, "orphaned blob left behind: {}", e);
        }
    }
}

/// parse_key
///
/// Recovers the owner from a stored key. Returns `None` for anything that is
/// not laid out by [`build_key`].
pub fn parse_key(key: &str) -> Option<BlobOwner> {
    let key = sanitize_key(key);
    let segments: Vec<&str> = key.split('/').collect();
    let [journey, scope, _file] = segments.as_slice() else {
        return None;
    };

    let journey_id = Uuid::parse_str(journey.strip_prefix("journey-")?).ok()?;
    if *scope == "cover" {
        return Some(BlobOwner::cover(journey_id));
    }
    let lesson_id = Uuid::parse_str(scope.strip_prefix("lesson-")?).ok()?;
    Some(BlobOwner::lesson(journey_id, lesson_id))
}

/// MIME type to serve a stored key with, derived from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    [BlobKind::Video, BlobKind::Document, BlobKind::Image]
        .iter()
        .flat_map(|kind| kind.allowed_types().iter())
        .find(|(_, ext)| ext.eq_ignore_ascii_case(extension))
        .map(|(mime, _)| *mime)
        .unwrap_or("application/octet-stream")
}

/// sanitize_key
///
/// Strips empty, `.` and `..` segments so a key can never escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
