//! Avatar lifecycle service
//!
//! Drives an avatar from `draft` through photo collection and training to a
//! terminal status. User actions (photo upload, confirm, train, cancel) and
//! training callbacks are the only writers; every write checks
//! [`AvatarStatus::can_transition_to`] and is applied as a compare-and-set on
//! the stored status.

use std::io::{Cursor, Write};
use std::sync::{Arc, LazyLock};

use chrono::{Duration, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use crate::config::{AvatarConfig, Settings};
use crate::database::DatabaseService;
use crate::models::avatar::{
    Avatar, AvatarGender, AvatarPhoto, AvatarStatus, CreateAvatarPhotoRequest, CreateAvatarRequest,
    PhotoValidationStatus, TrainingOutcome,
};
use crate::services::balance::LedgerService;
use crate::services::storage::{Bucket, ObjectStorage, StoragePaths};
use crate::services::training::{TrainingApi, TrainingRequest, TrainingWebhook, WebhookStatus};
use crate::utils::errors::{AishaError, Result, StorageError, StorageResult};
use crate::utils::helpers::generate_trigger_word;
use crate::utils::logging::{log_avatar_transition, log_balance_change, log_webhook_event};

/// A photo received from the user
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub telegram_file_unique_id: String,
    pub data: Vec<u8>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub content_type: String,
}

/// What happened to a training callback
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Applied(Avatar),
    Ignored(String),
}

impl WebhookOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WebhookOutcome::Applied(_))
    }
}

fn invalid_transition(from: AvatarStatus, to: AvatarStatus) -> AishaError {
    AishaError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn ensure_transition(from: AvatarStatus, to: AvatarStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(invalid_transition(from, to))
    }
}

static AVATAR_NAME_PATTERN: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N} _-]{2,40}$"));

/// Validate and normalize an avatar name
pub fn validate_avatar_name(name: &str) -> Result<String> {
    let name = name.trim();
    let pattern = AVATAR_NAME_PATTERN
        .as_ref()
        .map_err(|_| AishaError::Config("Invalid avatar name pattern".to_string()))?;

    if !pattern.is_match(name) {
        return Err(AishaError::InvalidInput(
            "avatar name must be 2-40 letters, digits, spaces, '-' or '_'".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Shortest side a training photo may have, in pixels
pub const MIN_PHOTO_SIDE: i32 = 256;

/// Classify a photo before storing it; `Pending` when its dimensions are unknown
pub fn assess_photo(upload: &PhotoUpload) -> PhotoValidationStatus {
    if !upload.content_type.starts_with("image/") {
        return PhotoValidationStatus::Invalid;
    }

    match (upload.width, upload.height) {
        (Some(width), Some(height)) if width.min(height) < MIN_PHOTO_SIDE => PhotoValidationStatus::Invalid,
        (Some(_), Some(_)) => PhotoValidationStatus::Valid,
        _ => PhotoValidationStatus::Pending,
    }
}

/// Pack photos into a zip archive in upload order
pub fn build_training_archive(files: &[(String, Vec<u8>)]) -> StorageResult<Vec<u8>> {
    let archive_error = |e: zip::result::ZipError| StorageError::Archive(e.to_string());

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, data) in files {
        writer.start_file(name.as_str(), options).map_err(archive_error)?;
        writer.write_all(data).map_err(|e| StorageError::Archive(e.to_string()))?;
    }

    let cursor = writer.finish().map_err(archive_error)?;
    Ok(cursor.into_inner())
}

#[derive(Clone)]
pub struct AvatarService {
    db: DatabaseService,
    ledger: LedgerService,
    storage: Arc<dyn ObjectStorage>,
    training: Arc<dyn TrainingApi>,
    config: AvatarConfig,
    training_steps: i32,
    presign_ttl_seconds: u32,
}

impl AvatarService {
    pub fn new(
        db: DatabaseService,
        ledger: LedgerService,
        storage: Arc<dyn ObjectStorage>,
        training: Arc<dyn TrainingApi>,
        settings: &Settings,
    ) -> Self {
        Self {
            db,
            ledger,
            storage,
            training,
            config: settings.avatar.clone(),
            training_steps: settings.fal.training_steps,
            presign_ttl_seconds: settings.storage.presign_ttl_seconds,
        }
    }

    pub fn min_photos(&self) -> i32 {
        self.config.min_photos
    }

    pub fn max_photos(&self) -> i32 {
        self.config.max_photos
    }

    pub fn training_cost(&self) -> Decimal {
        self.config.training_cost
    }

    /// Create a new avatar in `draft`
    pub async fn create_avatar(&self, user_id: i64, name: &str, gender: AvatarGender) -> Result<Avatar> {
        let name = validate_avatar_name(name)?;

        let avatar = self.db.avatars.create(CreateAvatarRequest {
            user_id,
            name,
            gender,
            trigger_word: generate_trigger_word(),
            training_steps: self.training_steps,
        }).await?;

        info!(avatar_id = %avatar.id, user_id = user_id, "Avatar created");
        Ok(avatar)
    }

    pub async fn get_avatar(&self, avatar_id: Uuid) -> Result<Avatar> {
        self.db.avatars.find_by_id(avatar_id).await?
            .ok_or(AishaError::AvatarNotFound { avatar_id })
    }

    /// Avatar owned by `user_id`; other users' avatars look missing
    pub async fn get_owned_avatar(&self, user_id: i64, avatar_id: Uuid) -> Result<Avatar> {
        let avatar = self.get_avatar(avatar_id).await?;
        if avatar.user_id != user_id {
            return Err(AishaError::AvatarNotFound { avatar_id });
        }
        Ok(avatar)
    }

    pub async fn list_avatars(&self, user_id: i64) -> Result<Vec<Avatar>> {
        self.db.avatars.list_for_user(user_id).await
    }

    pub async fn photos(&self, avatar_id: Uuid) -> Result<Vec<AvatarPhoto>> {
        self.db.avatar_photos.list_for_avatar(avatar_id).await
    }

    /// Store a photo and attach it to the avatar
    pub async fn add_photo(&self, avatar_id: Uuid, upload: PhotoUpload) -> Result<AvatarPhoto> {
        if upload.data.is_empty() {
            return Err(AishaError::InvalidInput("photo is empty".to_string()));
        }
        if upload.data.len() as u64 > self.config.max_photo_size_bytes {
            return Err(AishaError::InvalidInput(format!(
                "photo is larger than {} bytes",
                self.config.max_photo_size_bytes
            )));
        }

        let validation_status = assess_photo(&upload);
        if validation_status == PhotoValidationStatus::Invalid {
            return Err(AishaError::InvalidInput(format!(
                "photo must be an image of at least {0}x{0} pixels",
                MIN_PHOTO_SIDE
            )));
        }

        let mut tx = self.db.begin().await?;
        let avatar = self.db.avatars.lock_for_update(&mut tx, avatar_id).await?
            .ok_or(AishaError::AvatarNotFound { avatar_id })?;

        if !avatar.status.accepts_photos() {
            return Err(invalid_transition(avatar.status, AvatarStatus::PhotosUploading));
        }
        if self.db.avatar_photos.exists_for_file(&mut tx, avatar_id, &upload.telegram_file_unique_id).await? {
            return Err(AishaError::InvalidInput("this photo was already added".to_string()));
        }
        if avatar.photos_count >= self.config.max_photos {
            return Err(AishaError::InvalidInput(format!(
                "an avatar can have at most {} photos",
                self.config.max_photos
            )));
        }

        let upload_order = avatar.photos_count + 1;
        let key = StoragePaths::avatar_photo(avatar.user_id, avatar_id, upload_order);
        let file_size = upload.data.len() as i64;
        self.storage.upload(Bucket::Avatars, &key, upload.data, &upload.content_type).await?;

        let recorded = async {
            let photo = self.db.avatar_photos.insert(&mut tx, CreateAvatarPhotoRequest {
                id: Uuid::new_v4(),
                avatar_id,
                user_id: avatar.user_id,
                storage_key: key.clone(),
                upload_order,
                validation_status,
                telegram_file_unique_id: upload.telegram_file_unique_id,
                file_size,
                width: upload.width,
                height: upload.height,
                content_type: upload.content_type,
            }).await?;
            let updated = self.db.avatars.record_photo_added(&mut tx, avatar_id).await?;
            Ok::<_, AishaError>((photo, updated))
        }
        .await;

        let (photo, updated) = match recorded {
            Ok(rows) => rows,
            Err(e) => {
                self.discard_object(Bucket::Avatars, &key).await;
                return Err(e);
            }
        };
        if let Err(e) = tx.commit().await {
            self.discard_object(Bucket::Avatars, &key).await;
            return Err(e.into());
        }

        if avatar.status != updated.status {
            log_avatar_transition(avatar_id, avatar.status.as_str(), updated.status.as_str());
        }
        debug!(avatar_id = %avatar_id, photos_count = updated.photos_count, "Photo added");
        Ok(photo)
    }

    /// `photos_uploading -> ready_for_training` once enough photos are in
    pub async fn confirm_photos(&self, avatar_id: Uuid) -> Result<Avatar> {
        let avatar = self.get_avatar(avatar_id).await?;
        ensure_transition(avatar.status, AvatarStatus::ReadyForTraining)?;

        if avatar.photos_count < self.config.min_photos {
            return Err(AishaError::InvalidInput(format!(
                "at least {} photos are needed, {} uploaded",
                self.config.min_photos, avatar.photos_count
            )));
        }

        let updated = self.db.avatars
            .transition(avatar_id, avatar.status, AvatarStatus::ReadyForTraining)
            .await?
            .ok_or_else(|| invalid_transition(avatar.status, AvatarStatus::ReadyForTraining))?;

        log_avatar_transition(avatar_id, avatar.status.as_str(), updated.status.as_str());
        Ok(updated)
    }

    /// Charge for training, hand the photos to the training API and move to `training`
    ///
    /// The avatar row is locked, claimed and charged in one database
    /// transaction, so a second concurrent call sees `training` and is
    /// rejected without paying. The charge is not refunded when submission
    /// fails; the avatar moves to `error` instead.
    pub async fn start_training(&self, avatar_id: Uuid, webhook_url: &str) -> Result<Avatar> {
        let mut tx = self.db.begin().await?;
        let avatar = self.db.avatars.lock_for_update(&mut tx, avatar_id).await?
            .ok_or(AishaError::AvatarNotFound { avatar_id })?;
        ensure_transition(avatar.status, AvatarStatus::Training)?;

        let description = format!("Avatar training: {}", avatar.name);
        let cost = self.config.training_cost;
        let balance = self.ledger.charge_in(&mut tx, avatar.user_id, cost, &description).await?;
        let claimed = self.db.avatars.claim_for_training(&mut tx, avatar_id).await?
            .ok_or_else(|| invalid_transition(avatar.status, AvatarStatus::Training))?;
        tx.commit().await?;

        log_balance_change(avatar.user_id, -cost, balance, &description);
        log_avatar_transition(avatar_id, avatar.status.as_str(), claimed.status.as_str());

        let request_id = match self.submit(&claimed, webhook_url).await {
            Ok(request_id) => request_id,
            Err(e) => {
                warn!(avatar_id = %avatar_id, error = %e, "Training submission failed");
                if self.db.avatars.mark_failed(avatar_id, AvatarStatus::Training, &e.to_string()).await?.is_some() {
                    log_avatar_transition(avatar_id, AvatarStatus::Training.as_str(), AvatarStatus::Error.as_str());
                }
                return Err(e);
            }
        };

        let Some(updated) = self.db.avatars.record_request_id(avatar_id, &request_id).await? else {
            warn!(avatar_id = %avatar_id, request_id = %request_id, "Avatar changed while training was submitted");
            let current = self.get_avatar(avatar_id).await?;
            return Err(invalid_transition(current.status, AvatarStatus::Training));
        };

        info!(avatar_id = %avatar_id, request_id = %request_id, "Training submitted");
        Ok(updated)
    }

    async fn submit(&self, avatar: &Avatar, webhook_url: &str) -> Result<String> {
        let photos = self.db.avatar_photos.list_for_avatar(avatar.id).await?;
        if photos.is_empty() {
            return Err(AishaError::InvalidInput("avatar has no photos".to_string()));
        }

        let mut files = Vec::with_capacity(photos.len());
        for photo in &photos {
            let data = self.storage.download(Bucket::Avatars, &photo.storage_key).await?;
            files.push((format!("photo_{:02}.jpg", photo.upload_order), data));
        }

        let archive = build_training_archive(&files)?;
        let archive_key = StoragePaths::training_archive(avatar.user_id, avatar.id);
        self.storage.upload(Bucket::Temp, &archive_key, archive, "application/zip").await?;
        let images_data_url = self.storage
            .presigned_url(Bucket::Temp, &archive_key, self.presign_ttl_seconds)
            .await?;

        let request = TrainingRequest {
            images_data_url,
            trigger_word: avatar.trigger_word.clone(),
            steps: avatar.training_steps,
            create_masks: true,
            is_style: false,
        };
        self.training.submit_training(&request, webhook_url).await
    }

    /// Apply a training callback; anything that does not match a training avatar is ignored
    pub async fn apply_training_webhook(&self, webhook: &TrainingWebhook) -> Result<WebhookOutcome> {
        let status_label = match &webhook.status {
            WebhookStatus::Finished(TrainingOutcome::Completed { .. }) => "completed",
            WebhookStatus::Finished(TrainingOutcome::Failed { .. }) => "failed",
            WebhookStatus::InProgress(_) => "in_progress",
            WebhookStatus::Unknown(_) => "unknown",
        };

        let outcome = self.apply_webhook_inner(webhook).await?;
        log_webhook_event(&webhook.request_id, status_label, outcome.is_applied());
        Ok(outcome)
    }

    async fn apply_webhook_inner(&self, webhook: &TrainingWebhook) -> Result<WebhookOutcome> {
        let outcome = match &webhook.status {
            WebhookStatus::Finished(outcome) => outcome,
            WebhookStatus::InProgress(status) => {
                return Ok(WebhookOutcome::Ignored(format!("training still running ({})", status)));
            }
            WebhookStatus::Unknown(status) => {
                warn!(request_id = %webhook.request_id, status = %status, "Unknown training status");
                return Ok(WebhookOutcome::Ignored(format!("unknown status '{}'", status)));
            }
        };

        let Some(avatar) = self.db.avatars.find_by_request_id(&webhook.request_id).await? else {
            warn!(request_id = %webhook.request_id, "Training callback for unknown request");
            return Ok(WebhookOutcome::Ignored("unknown request_id".to_string()));
        };

        if avatar.status != AvatarStatus::Training {
            return Ok(WebhookOutcome::Ignored(format!("avatar is {}", avatar.status)));
        }

        let updated = match outcome {
            TrainingOutcome::Completed { diffusers_lora_file_url, config_file_url } => {
                self.db.avatars
                    .mark_completed(avatar.id, diffusers_lora_file_url.as_deref(), config_file_url.as_deref())
                    .await?
            }
            TrainingOutcome::Failed { error_message } => {
                self.db.avatars.mark_failed(avatar.id, AvatarStatus::Training, error_message).await?
            }
        };

        match updated {
            Some(updated) => {
                log_avatar_transition(updated.id, avatar.status.as_str(), updated.status.as_str());
                self.discard_object(Bucket::Temp, &StoragePaths::training_archive(updated.user_id, updated.id)).await;
                Ok(WebhookOutcome::Applied(updated))
            }
            None => Ok(WebhookOutcome::Ignored("avatar left training concurrently".to_string())),
        }
    }

    /// Cancel a non-terminal avatar and remove its photos
    pub async fn cancel_avatar(&self, avatar_id: Uuid) -> Result<Avatar> {
        let avatar = self.get_avatar(avatar_id).await?;
        ensure_transition(avatar.status, AvatarStatus::Cancelled)?;

        let cancelled = self.db.avatars
            .transition(avatar_id, avatar.status, AvatarStatus::Cancelled)
            .await?
            .ok_or_else(|| invalid_transition(avatar.status, AvatarStatus::Cancelled))?;
        log_avatar_transition(avatar_id, avatar.status.as_str(), cancelled.status.as_str());

        let photos = self.db.avatar_photos.list_for_avatar(avatar_id).await?;
        for photo in &photos {
            self.discard_object(Bucket::Avatars, &photo.storage_key).await;
        }
        self.discard_object(Bucket::Temp, &StoragePaths::training_archive(avatar.user_id, avatar_id)).await;

        let removed = self.db.avatar_photos.delete_for_avatar(avatar_id).await?;
        self.db.avatars.reset_photos_count(avatar_id).await?;
        info!(avatar_id = %avatar_id, photos_removed = removed, "Avatar cancelled");

        Ok(Avatar { photos_count: 0, ..cancelled })
    }

    /// Avatars in `training` for longer than `older_than`
    pub async fn stuck_in_training(&self, older_than: Duration) -> Result<Vec<Avatar>> {
        self.db.avatars.list_training_started_before(Utc::now() - older_than).await
    }

    async fn discard_object(&self, bucket: Bucket, key: &str) {
        if let Err(e) = self.storage.delete(bucket, key).await {
            warn!(bucket = %bucket, key = key, error = %e, "Failed to delete object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_validate_avatar_name() {
        assert_eq!(validate_avatar_name("  Anna  ").unwrap(), "Anna");
        assert_eq!(validate_avatar_name("Мой аватар_1").unwrap(), "Мой аватар_1");
        assert!(validate_avatar_name("A").is_err());
        assert!(validate_avatar_name(&"x".repeat(41)).is_err());
        assert_matches!(validate_avatar_name("bad/name"), Err(AishaError::InvalidInput(_)));
    }

    fn upload(content_type: &str, width: Option<i32>, height: Option<i32>) -> PhotoUpload {
        PhotoUpload {
            telegram_file_unique_id: "AQAD0001".to_string(),
            data: vec![0xFF, 0xD8, 0xFF],
            width,
            height,
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn test_assess_photo() {
        assert_eq!(assess_photo(&upload("image/jpeg", Some(1024), Some(768))), PhotoValidationStatus::Valid);
        assert_eq!(assess_photo(&upload("image/png", None, None)), PhotoValidationStatus::Pending);
        assert_eq!(assess_photo(&upload("image/jpeg", Some(1024), Some(100))), PhotoValidationStatus::Invalid);
        assert_eq!(assess_photo(&upload("application/pdf", Some(1024), Some(1024))), PhotoValidationStatus::Invalid);
    }

    #[test]
    fn test_avatar_name_pattern_compiles() {
        assert!(AVATAR_NAME_PATTERN.is_ok());
    }

    #[test]
    fn test_ensure_transition() {
        assert!(ensure_transition(AvatarStatus::Training, AvatarStatus::Completed).is_ok());
        assert_matches!(
            ensure_transition(AvatarStatus::Completed, AvatarStatus::Draft),
            Err(AishaError::InvalidStateTransition { from, to }) if from == "completed" && to == "draft"
        );
    }

    #[test]
    fn test_training_archive_keeps_order() {
        let files = vec![
            ("photo_01.jpg".to_string(), vec![1u8; 32]),
            ("photo_02.jpg".to_string(), vec![2u8; 32]),
        ];
        let bytes = build_training_archive(&files).unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(archive.len(), 2);
        assert!(names.contains(&"photo_01.jpg"));
        assert!(names.contains(&"photo_02.jpg"));
    }
}
