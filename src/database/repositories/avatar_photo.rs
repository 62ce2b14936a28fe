//! Avatar photo repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use uuid::Uuid;
use crate::models::avatar::{AvatarPhoto, CreateAvatarPhotoRequest};
use crate::utils::errors::AishaError;

const PHOTO_COLUMNS: &str = "id, avatar_id, user_id, storage_key, upload_order, validation_status, \
    telegram_file_unique_id, file_size, width, height, content_type, created_at";

#[derive(Clone, Debug)]
pub struct AvatarPhotoRepository {
    pool: PgPool,
}

impl AvatarPhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a photo inside the caller's transaction
    pub async fn insert(&self, conn: &mut PgConnection, request: CreateAvatarPhotoRequest) -> Result<AvatarPhoto, AishaError> {
        let photo = sqlx::query_as::<_, AvatarPhoto>(&format!(
            r#"
            INSERT INTO avatar_photos (id, avatar_id, user_id, storage_key, upload_order, validation_status,
                telegram_file_unique_id, file_size, width, height, content_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {PHOTO_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(request.avatar_id)
        .bind(request.user_id)
        .bind(request.storage_key)
        .bind(request.upload_order)
        .bind(request.validation_status)
        .bind(request.telegram_file_unique_id)
        .bind(request.file_size)
        .bind(request.width)
        .bind(request.height)
        .bind(request.content_type)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(photo)
    }

    /// Whether the same Telegram file was already added to the avatar
    pub async fn exists_for_file(&self, conn: &mut PgConnection, avatar_id: Uuid, file_unique_id: &str) -> Result<bool, AishaError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM avatar_photos WHERE avatar_id = $1 AND telegram_file_unique_id = $2)"
        )
        .bind(avatar_id)
        .bind(file_unique_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(exists.0)
    }

    /// Photos in upload order
    pub async fn list_for_avatar(&self, avatar_id: Uuid) -> Result<Vec<AvatarPhoto>, AishaError> {
        let photos = sqlx::query_as::<_, AvatarPhoto>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM avatar_photos WHERE avatar_id = $1 ORDER BY upload_order ASC"
        ))
        .bind(avatar_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    /// Remove all photo rows of an avatar
    pub async fn delete_for_avatar(&self, avatar_id: Uuid) -> Result<u64, AishaError> {
        let result = sqlx::query("DELETE FROM avatar_photos WHERE avatar_id = $1")
            .bind(avatar_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
