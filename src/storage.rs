use async_trait::async_trait;
use aws_sdk_s3 as s3;
use axum::body::Bytes;
use s3::error::ProvideErrorMetadata;
use s3::primitives::ByteStream;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

pub const IMAGE_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];
pub const VIDEO_MIME_TYPES: &[&str] = &["video/mp4", "video/webm", "video/quicktime"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path escapes the storage root: {0}")]
    InvalidPath(String),
    #[error("file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("object storage request failed: {0}")]
    Remote(String),
}

/// MediaCategory
///
/// Coarse content class of a file. Doubles as the storage folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Images,
    Videos,
    Documents,
    Others,
}

impl MediaCategory {
    pub fn from_mime(mimetype: &str) -> Self {
        let mimetype = mimetype.trim().to_ascii_lowercase();
        if mimetype.starts_with("image/") {
            MediaCategory::Images
        } else if mimetype.starts_with("video/") {
            MediaCategory::Videos
        } else if DOCUMENT_MIME_TYPES.contains(&mimetype.as_str()) {
            MediaCategory::Documents
        } else {
            MediaCategory::Others
        }
    }

    pub fn folder(self) -> &'static str {
        match self {
            MediaCategory::Images => "Images",
            MediaCategory::Videos => "Videos",
            MediaCategory::Documents => "Documents",
            MediaCategory::Others => "Others",
        }
    }
}

/// True when `mimetype` appears in any of the allow-lists.
pub fn mime_allowed(mimetype: &str, allow_lists: &[&[&str]]) -> bool {
    let mimetype = mimetype.trim().to_ascii_lowercase();
    allow_lists.iter().any(|list| list.contains(&mimetype.as_str()))
}

/// UploadedFile
///
/// One multipart file part, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// StoredObject
///
/// Where a stored file ended up: its public URL plus the provider id needed to delete it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub url: String,
    pub public_id: String,
    pub mimetype: String,
}

/// PurgeReport
///
/// Outcome of a multi-file deletion. Failures are collected per file rather than aborting.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurgeReport {
    pub removed: usize,
    pub failed: Vec<String>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// StorageService
///
/// "Put a file, get a URL back" and "delete a URL's file" over interchangeable backends.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Prepares the backend (creates the uploads root or the bucket). Safe to call repeatedly.
    async fn ensure_ready(&self) -> Result<(), StorageError>;

    /// Stores `file` under `context/<Category>/` and returns its public location.
    async fn store(
        &self,
        file: &UploadedFile,
        context: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Removes the object behind a public URL or provider id. An object that is already gone
    /// counts as deleted.
    async fn delete(&self, url_or_id: &str, mimetype: &str) -> Result<(), StorageError>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a caller-provided segment can never climb out of its
/// folder.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn extension_for(file_name: &str, mimetype: &str) -> String {
    let from_name = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }
    match mimetype {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        _ => "bin",
    }
    .to_string()
}

/// object_key
///
/// `<context>/<Category>/<uuid>.<ext>`. Every stored object gets a fresh name.
pub fn object_key(context: &str, file: &UploadedFile) -> String {
    let context = sanitize_key(context);
    let context = if context.is_empty() { "misc".to_string() } else { context };
    format!(
        "{}/{}/{}.{}",
        context,
        MediaCategory::from_mime(&file.content_type).folder(),
        Uuid::new_v4(),
        extension_for(&file.file_name, &file.content_type)
    )
}

/// store_all
///
/// Stores every file or none: when one store fails, the ones already written are removed
/// before the error is returned.
pub async fn store_all(
    storage: &dyn StorageService,
    files: &[UploadedFile],
    context: &str,
) -> Result<Vec<StoredObject>, StorageError> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        match storage.store(file, context).await {
            Ok(object) => stored.push(object),
            Err(e) => {
                discard(storage, &stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

/// Best-effort removal of freshly stored objects after a later step failed.
pub async fn discard(storage: &dyn StorageService, objects: &[StoredObject]) {
    for object in objects {
        if let Err(e) = storage.delete(&object.public_id, &object.mimetype).await {
            tracing::warn!(error = %e, url = %object.url, "failed to discard stored object");
        }
    }
}

/// purge
///
/// Deletes every `(url_or_id, mimetype)` pair, collecting per-file failures.
pub async fn purge(storage: &dyn StorageService, files: &[(String, String)]) -> PurgeReport {
    let mut report = PurgeReport::default();
    for (target, mimetype) in files {
        match storage.delete(target, mimetype).await {
            Ok(()) => report.removed += 1,
            Err(e) => {
                tracing::warn!(error = %e, target = %target, "failed to delete stored file");
                report.failed.push(target.clone());
            }
        }
    }
    report
}

// --- Local filesystem ---

/// LocalStorage
///
/// Writes uploads below `root`, served by the HTTP layer at `{public_base_url}/uploads`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: format!("{}/uploads", public_base_url.trim_end_matches('/')),
        }
    }

    /// Resolves a public URL or relative key to a path that is guaranteed to sit under the
    /// uploads root.
    fn resolve(&self, url_or_id: &str) -> Result<PathBuf, StorageError> {
        let key = url_or_id
            .strip_prefix(&self.public_prefix)
            .or_else(|| url_or_id.strip_prefix("/uploads"))
            .unwrap_or(url_or_id)
            .trim_start_matches('/');

        let relative = Path::new(key);
        let inside_root = !key.is_empty()
            && !key.contains("://")
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !inside_root {
            return Err(StorageError::InvalidPath(url_or_id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn store(
        &self,
        file: &UploadedFile,
        context: &str,
    ) -> Result<StoredObject, StorageError> {
        let key = object_key(context, file);
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.bytes).await?;
        tracing::debug!(key = %key, size = file.bytes.len(), "stored upload locally");
        Ok(StoredObject {
            url: format!("{}/{}", self.public_prefix, key),
            public_id: key,
            mimetype: file.content_type.clone(),
        })
    }

    async fn delete(&self, url_or_id: &str, mimetype: &str) -> Result<(), StorageError> {
        let path = self.resolve(url_or_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), mimetype, "deleted local upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// --- S3-compatible object storage ---

/// S3StorageClient
///
/// Object storage through the AWS SDK. Works against MinIO locally and any S3-compatible
/// gateway in production.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_url: String,
}

impl S3StorageClient {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key) is what MinIO expects.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn key_for(&self, url_or_id: &str) -> String {
        let key = url_or_id
            .strip_prefix(&self.public_url)
            .unwrap_or(url_or_id)
            .trim_start_matches('/');
        sanitize_key(key)
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        // CreateBucket fails harmlessly when the bucket already exists.
        if let Err(e) = self.client.create_bucket().bucket(&self.bucket_name).send().await {
            tracing::debug!(bucket = %self.bucket_name, code = ?e.code(), "create_bucket skipped");
        }
        Ok(())
    }

    async fn store(
        &self,
        file: &UploadedFile,
        context: &str,
    ) -> Result<StoredObject, StorageError> {
        let key = object_key(context, file);
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(&file.content_type)
            .body(ByteStream::from(file.bytes.clone()))
            .send()
            .await
            .map_err(|e| {
                StorageError::Remote(format!(
                    "put_object {key}: {}",
                    e.message().unwrap_or("unknown error")
                ))
            })?;
        Ok(StoredObject {
            url: format!("{}/{}", self.public_url, key),
            public_id: key,
            mimetype: file.content_type.clone(),
        })
    }

    async fn delete(&self, url_or_id: &str, mimetype: &str) -> Result<(), StorageError> {
        let key = self.key_for(url_or_id);
        if key.is_empty() {
            return Err(StorageError::InvalidPath(url_or_id.to_string()));
        }
        match self
            .client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => {
                tracing::debug!(key = %key, mimetype, "deleted object");
                Ok(())
            }
            Err(e) if matches!(e.code(), Some("NoSuchKey") | Some("NotFound")) => Ok(()),
            Err(e) => Err(StorageError::Remote(format!(
                "delete_object {key}: {}",
                e.message().unwrap_or("unknown error")
            ))),
        }
    }
}

// --- Test double ---

/// MockStorageService
///
/// Records what was stored and deleted without touching any backend. `should_fail` makes every
/// store/delete fail.
#[derive(Default)]
pub struct MockStorageService {
    pub should_fail: bool,
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true, ..Self::default() }
    }

    /// URLs stored so far, in order.
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Targets deleted so far, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn store(
        &self,
        file: &UploadedFile,
        context: &str,
    ) -> Result<StoredObject, StorageError> {
        if self.should_fail {
            return Err(StorageError::Remote("mock storage failure".into()));
        }
        let key = object_key(context, file);
        let url = format!("http://localhost:9000/mock-bucket/{key}");
        if let Ok(mut stored) = self.stored.lock() {
            stored.push(url.clone());
        }
        Ok(StoredObject { url, public_id: key, mimetype: file.content_type.clone() })
    }

    async fn delete(&self, url_or_id: &str, _mimetype: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Remote("mock storage failure".into()));
        }
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(url_or_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, mime: &str) -> UploadedFile {
        UploadedFile {
            field: "file".into(),
            file_name: name.into(),
            content_type: mime.into(),
            bytes: Bytes::from_static(b"data"),
        }
    }

    #[test]
    fn categories_follow_mime_family() {
        assert_eq!(MediaCategory::from_mime("image/webp"), MediaCategory::Images);
        assert_eq!(MediaCategory::from_mime("video/mp4"), MediaCategory::Videos);
        assert_eq!(MediaCategory::from_mime("application/msword"), MediaCategory::Documents);
        assert_eq!(MediaCategory::from_mime("text/csv"), MediaCategory::Others);
    }

    #[test]
    fn object_keys_are_namespaced_and_sanitised() {
        let key = object_key("../events/./2080", &upload("Poster.PNG", "image/png"));
        assert!(key.starts_with("events/2080/Images/"), "{key}");
        assert!(key.ends_with(".png"));

        let key = object_key("", &upload("noext", "application/pdf"));
        assert!(key.starts_with("misc/Documents/") && key.ends_with(".pdf"), "{key}");
    }

    #[test]
    fn allow_lists_are_case_insensitive() {
        assert!(mime_allowed("IMAGE/JPEG", &[IMAGE_MIME_TYPES]));
        assert!(!mime_allowed("image/svg+xml", &[IMAGE_MIME_TYPES, DOCUMENT_MIME_TYPES]));
        assert!(mime_allowed("video/webm", &[IMAGE_MIME_TYPES, VIDEO_MIME_TYPES]));
    }

    #[test]
    fn local_resolution_refuses_paths_outside_the_root() {
        let storage = LocalStorage::new("/srv/uploads", "http://localhost:3000/");
        assert_eq!(
            storage.resolve("http://localhost:3000/uploads/users/Images/a.png").unwrap(),
            PathBuf::from("/srv/uploads/users/Images/a.png")
        );
        assert_eq!(
            storage.resolve("users/Images/a.png").unwrap(),
            PathBuf::from("/srv/uploads/users/Images/a.png")
        );
        assert!(storage.resolve("http://localhost:3000/uploads/../etc/passwd").is_err());
        assert!(storage.resolve("/uploads/../../etc/passwd").is_err());
        assert!(storage.resolve("https://elsewhere.example/a.png").is_err());
    }

    #[tokio::test]
    async fn store_all_discards_partial_batches() {
        let storage = MockStorageService::new();
        let files = vec![upload("a.png", "image/png"), upload("b.png", "image/png")];
        let stored = store_all(&storage, &files, "gallery").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(storage.stored().len(), 2);

        let failing = MockStorageService::new_failing();
        assert!(store_all(&failing, &files, "gallery").await.is_err());
    }
}
