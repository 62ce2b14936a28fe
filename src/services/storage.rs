//! Object storage service
//!
//! Blobs live in four buckets (avatars, transcripts, documents, temp) under
//! keys of the form `users/{user_id}/{entity}/{id}/{file}`. Production uses
//! MinIO through [`S3Storage`]; tests and local runs can use [`MemoryStorage`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use crate::config::StorageConfig;
use crate::utils::errors::{StorageError, StorageResult};
use crate::utils::logging::log_storage_operation;

/// Logical bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Avatars,
    Transcripts,
    Documents,
    Temp,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Avatars, Bucket::Transcripts, Bucket::Documents, Bucket::Temp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Avatars => "avatars",
            Bucket::Transcripts => "transcripts",
            Bucket::Documents => "documents",
            Bucket::Temp => "temp",
        }
    }

    /// Physical bucket name from configuration
    pub fn name_in<'a>(&self, config: &'a StorageConfig) -> &'a str {
        match self {
            Bucket::Avatars => &config.avatars_bucket,
            Bucket::Transcripts => &config.transcripts_bucket,
            Bucket::Documents => &config.documents_bucket,
            Bucket::Temp => &config.temp_bucket,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| StorageError::UnknownBucket(s.to_string()))
    }
}

/// Key layout shared by every writer
pub struct StoragePaths;

impl StoragePaths {
    pub fn avatar_prefix(user_id: i64, avatar_id: Uuid) -> String {
        format!("users/{}/avatars/{}/", user_id, avatar_id)
    }

    pub fn avatar_photo(user_id: i64, avatar_id: Uuid, number: i32) -> String {
        format!("{}photo_{}.jpg", Self::avatar_prefix(user_id, avatar_id), number)
    }

    /// Zip of all photos handed to the training API; lives in the temp bucket
    pub fn training_archive(user_id: i64, avatar_id: Uuid) -> String {
        format!("{}training_photos.zip", Self::avatar_prefix(user_id, avatar_id))
    }

    pub fn transcript_audio(user_id: i64, transcript_id: Uuid, extension: &str) -> String {
        format!("users/{}/transcripts/{}/audio.{}", user_id, transcript_id, extension)
    }

    pub fn transcript_text(user_id: i64, transcript_id: Uuid) -> String {
        format!("users/{}/transcripts/{}/transcript.txt", user_id, transcript_id)
    }
}

/// Blob storage backend
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: Bucket, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn download(&self, bucket: Bucket, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()>;

    async fn presigned_url(&self, bucket: Bucket, key: &str, ttl_seconds: u32) -> StorageResult<String>;

    async fn exists(&self, bucket: Bucket, key: &str) -> StorageResult<bool>;
}

/// MinIO / S3 backend
pub struct S3Storage {
    buckets: HashMap<Bucket, Box<s3::Bucket>>,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Credentials(e.to_string()))?;

        let mut buckets = HashMap::new();
        for bucket in Bucket::ALL {
            let handle = s3::Bucket::new(bucket.name_in(config), region.clone(), credentials.clone())
                .map_err(request_failed)?
                .with_path_style();
            buckets.insert(bucket, handle);
        }

        Ok(Self { buckets })
    }

    fn bucket(&self, bucket: Bucket) -> StorageResult<&s3::Bucket> {
        self.buckets
            .get(&bucket)
            .map(|b| b.as_ref())
            .ok_or_else(|| StorageError::UnknownBucket(bucket.to_string()))
    }
}

fn request_failed(error: S3Error) -> StorageError {
    StorageError::RequestFailed(error.to_string())
}

fn not_found_or_failed(error: S3Error, bucket: Bucket, key: &str) -> StorageError {
    match error {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        other => request_failed(other),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(&self, bucket: Bucket, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let result = self.bucket(bucket)?
            .put_object_with_content_type(key, &data, content_type)
            .await;
        log_storage_operation("upload", bucket.as_str(), key, result.is_ok());
        result.map(|_| ()).map_err(request_failed)
    }

    async fn download(&self, bucket: Bucket, key: &str) -> StorageResult<Vec<u8>> {
        let result = self.bucket(bucket)?.get_object(key).await;
        log_storage_operation("download", bucket.as_str(), key, result.is_ok());
        result
            .map(|response| response.bytes().to_vec())
            .map_err(|e| not_found_or_failed(e, bucket, key))
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        let result = self.bucket(bucket)?.delete_object(key).await;
        log_storage_operation("delete", bucket.as_str(), key, result.is_ok());
        result.map(|_| ()).map_err(request_failed)
    }

    async fn presigned_url(&self, bucket: Bucket, key: &str, ttl_seconds: u32) -> StorageResult<String> {
        self.bucket(bucket)?
            .presign_get(key, ttl_seconds, None)
            .await
            .map_err(request_failed)
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> StorageResult<bool> {
        match self.bucket(bucket)?.head_object(key).await {
            Ok(_) => Ok(true),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(request_failed(e)),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// In-process backend
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<(Bucket, String), StoredObject>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys stored in a bucket, sorted
    pub async fn keys(&self, bucket: Bucket) -> Vec<String> {
        let objects = self.objects.read().await;
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(b, _)| *b == bucket)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn content_type(&self, bucket: Bucket, key: &str) -> Option<String> {
        let objects = self.objects.read().await;
        objects.get(&(bucket, key.to_string())).map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, bucket: Bucket, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        debug!(bucket = %bucket, key = key, size = data.len(), "Storing object in memory");
        let mut objects = self.objects.write().await;
        objects.insert((bucket, key.to_string()), StoredObject {
            data,
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    async fn download(&self, bucket: Bucket, key: &str) -> StorageResult<Vec<u8>> {
        let objects = self.objects.read().await;
        objects
            .get(&(bucket, key.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        let mut objects = self.objects.write().await;
        objects.remove(&(bucket, key.to_string()));
        Ok(())
    }

    async fn presigned_url(&self, bucket: Bucket, key: &str, ttl_seconds: u32) -> StorageResult<String> {
        if !self.exists(bucket, key).await? {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(format!("memory://{}/{}?expires={}", bucket, key, ttl_seconds))
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> StorageResult<bool> {
        let objects = self.objects.read().await;
        Ok(objects.contains_key(&(bucket, key.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn minio_config(server: &MockServer) -> StorageConfig {
        StorageConfig {
            endpoint: server.uri(),
            access_key: "minio".to_string(),
            secret_key: "minio-secret".to_string(),
            ..StorageConfig::default()
        }
    }

    #[test]
    fn test_paths() {
        let avatar_id = Uuid::nil();
        assert_eq!(
            StoragePaths::avatar_photo(7, avatar_id, 3),
            "users/7/avatars/00000000-0000-0000-0000-000000000000/photo_3.jpg"
        );
        assert_eq!(
            StoragePaths::transcript_text(7, avatar_id),
            "users/7/transcripts/00000000-0000-0000-0000-000000000000/transcript.txt"
        );
    }

    #[test]
    fn test_bucket_names() {
        assert_eq!("temp".parse::<Bucket>().unwrap(), Bucket::Temp);
        assert_matches!("photos".parse::<Bucket>(), Err(StorageError::UnknownBucket(_)));

        let mut config = StorageConfig::default();
        config.avatars_bucket = "prod-avatars".to_string();
        assert_eq!(Bucket::Avatars.name_in(&config), "prod-avatars");
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let storage = MemoryStorage::new();
        let key = "users/1/documents/x/report.pdf";
        let data = vec![0u8, 1, 2, 255];

        storage.upload(Bucket::Documents, key, data.clone(), "application/pdf").await.unwrap();
        assert_eq!(storage.download(Bucket::Documents, key).await.unwrap(), data);
        assert!(storage.exists(Bucket::Documents, key).await.unwrap());
        assert!(!storage.exists(Bucket::Temp, key).await.unwrap());

        storage.delete(Bucket::Documents, key).await.unwrap();
        assert!(!storage.exists(Bucket::Documents, key).await.unwrap());
        assert_matches!(storage.download(Bucket::Documents, key).await, Err(StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_memory_presign_requires_object() {
        let storage = MemoryStorage::new();
        assert!(storage.presigned_url(Bucket::Temp, "missing.zip", 60).await.is_err());

        storage.upload(Bucket::Temp, "a.zip", vec![1], "application/zip").await.unwrap();
        let url = storage.presigned_url(Bucket::Temp, "a.zip", 60).await.unwrap();
        assert_eq!(url, "memory://temp/a.zip?expires=60");
    }

    #[tokio::test]
    async fn test_s3_round_trip() {
        let server = MockServer::start().await;
        let key = "users/1/transcripts/t1/audio.ogg";
        let data = vec![0x4F, 0x67, 0x67, 0x53, 0, 2, 255];

        Mock::given(method("PUT"))
            .and(path(format!("/transcripts/{}", key)))
            .and(header("content-type", "audio/ogg"))
            .and(body_bytes(data.clone()))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc\""))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/transcripts/{}", key)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(format!("/transcripts/{}", key)))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Length", "7"))
            .mount(&server)
            .await;

        let storage = S3Storage::new(&minio_config(&server)).unwrap();
        storage.upload(Bucket::Transcripts, key, data.clone(), "audio/ogg").await.unwrap();
        assert_eq!(storage.download(Bucket::Transcripts, key).await.unwrap(), data);
        assert!(storage.exists(Bucket::Transcripts, key).await.unwrap());
    }

    #[tokio::test]
    async fn test_s3_missing_object() {
        let server = MockServer::start().await;
        let missing = "<?xml version=\"1.0\"?><Error><Code>NoSuchKey</Code></Error>";
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string(missing))
            .mount(&server)
            .await;

        let storage = S3Storage::new(&minio_config(&server)).unwrap();
        assert!(!storage.exists(Bucket::Avatars, "users/1/avatars/a/photo_1.jpg").await.unwrap());
        assert_matches!(
            storage.download(Bucket::Avatars, "users/1/avatars/a/photo_1.jpg").await,
            Err(StorageError::NotFound { bucket, key }) if bucket == "avatars" && key == "users/1/avatars/a/photo_1.jpg"
        );
    }

    #[tokio::test]
    async fn test_s3_server_error_is_not_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let storage = S3Storage::new(&minio_config(&server)).unwrap();
        assert_matches!(storage.download(Bucket::Temp, "a.zip").await, Err(StorageError::RequestFailed(_)));
        assert_matches!(storage.exists(Bucket::Temp, "a.zip").await, Err(StorageError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_s3_presigned_url_targets_bucket() {
        let server = MockServer::start().await;
        let storage = S3Storage::new(&minio_config(&server)).unwrap();

        let url = storage.presigned_url(Bucket::Temp, "users/1/avatars/a/training_photos.zip", 600).await.unwrap();
        assert!(url.starts_with(&format!("{}/temp/users/1/avatars/a/training_photos.zip?", server.uri())));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}
