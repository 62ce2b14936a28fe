//! Avatar repository implementation
//!
//! Status writes are compare-and-set: every update names the status it
//! expects to replace, so a concurrent writer makes the update a no-op
//! instead of silently overwriting a newer status.

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::models::avatar::{Avatar, AvatarStatus, CreateAvatarRequest};
use crate::utils::errors::AishaError;

const AVATAR_COLUMNS: &str = "id, user_id, name, gender, status, trigger_word, training_steps, photos_count, \
    fal_request_id, diffusers_lora_file_url, config_file_url, error_message, training_started_at, \
    training_completed_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct AvatarRepository {
    pool: PgPool,
}

impl AvatarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new avatar in `draft`
    pub async fn create(&self, request: CreateAvatarRequest) -> Result<Avatar, AishaError> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            INSERT INTO avatars (id, user_id, name, gender, status, trigger_word, training_steps, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {AVATAR_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.name)
        .bind(request.gender)
        .bind(AvatarStatus::Draft)
        .bind(request.trigger_word)
        .bind(request.training_steps)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(avatar)
    }

    /// Find avatar by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Avatar>, AishaError> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!("SELECT {AVATAR_COLUMNS} FROM avatars WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(avatar)
    }

    /// Find the avatar a training request belongs to
    pub async fn find_by_request_id(&self, request_id: &str) -> Result<Option<Avatar>, AishaError> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            "SELECT {AVATAR_COLUMNS} FROM avatars WHERE fal_request_id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(avatar)
    }

    /// Lock an avatar row inside the caller's transaction
    pub async fn lock_for_update(&self, conn: &mut PgConnection, id: Uuid) -> Result<Option<Avatar>, AishaError> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            "SELECT {AVATAR_COLUMNS} FROM avatars WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(avatar)
    }

    /// Record one more photo and move to `photos_uploading`
    pub async fn record_photo_added(&self, conn: &mut PgConnection, id: Uuid) -> Result<Avatar, AishaError> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            UPDATE avatars
            SET photos_count = photos_count + 1, status = $2, updated_at = $3
            WHERE id = $1
            RETURNING {AVATAR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(AvatarStatus::PhotosUploading)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(avatar)
    }

    /// Move from `from` to `to`; `None` when the avatar is no longer in `from`
    pub async fn transition(&self, id: Uuid, from: AvatarStatus, to: AvatarStatus) -> Result<Option<Avatar>, AishaError> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            UPDATE avatars
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {AVATAR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(avatar)
    }

    /// `ready_for_training -> training` on a row locked by the caller
    pub async fn claim_for_training(&self, conn: &mut PgConnection, id: Uuid) -> Result<Option<Avatar>, AishaError> {
        let now = Utc::now();
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            UPDATE avatars
            SET status = $3, training_started_at = $4, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {AVATAR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(AvatarStatus::ReadyForTraining)
        .bind(AvatarStatus::Training)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(avatar)
    }

    /// Attach the external request id once; `None` when the avatar left `training` or already has one
    pub async fn record_request_id(&self, id: Uuid, request_id: &str) -> Result<Option<Avatar>, AishaError> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            UPDATE avatars
            SET fal_request_id = $3, updated_at = $4
            WHERE id = $1 AND status = $2 AND fal_request_id IS NULL
            RETURNING {AVATAR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(AvatarStatus::Training)
        .bind(request_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(avatar)
    }

    /// `training -> completed` with result files
    pub async fn mark_completed(
        &self,
        id: Uuid,
        diffusers_lora_file_url: Option<&str>,
        config_file_url: Option<&str>,
    ) -> Result<Option<Avatar>, AishaError> {
        let now = Utc::now();
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            UPDATE avatars
            SET status = $3, diffusers_lora_file_url = $4, config_file_url = $5,
                training_completed_at = $6, updated_at = $6
            WHERE id = $1 AND status = $2
            RETURNING {AVATAR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(AvatarStatus::Training)
        .bind(AvatarStatus::Completed)
        .bind(diffusers_lora_file_url)
        .bind(config_file_url)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(avatar)
    }

    /// `from -> error` with a message
    pub async fn mark_failed(&self, id: Uuid, from: AvatarStatus, error_message: &str) -> Result<Option<Avatar>, AishaError> {
        let now = Utc::now();
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            UPDATE avatars
            SET status = $3, error_message = $4, training_completed_at = $5, updated_at = $5
            WHERE id = $1 AND status = $2
            RETURNING {AVATAR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from)
        .bind(AvatarStatus::Error)
        .bind(error_message)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(avatar)
    }

    /// Reset the photo counter after photos were removed
    pub async fn reset_photos_count(&self, id: Uuid) -> Result<(), AishaError> {
        sqlx::query("UPDATE avatars SET photos_count = 0, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All avatars of a user, newest first
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Avatar>, AishaError> {
        let avatars = sqlx::query_as::<_, Avatar>(&format!(
            "SELECT {AVATAR_COLUMNS} FROM avatars WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(avatars)
    }

    /// Avatars still in `training` that started before the cutoff
    pub async fn list_training_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Avatar>, AishaError> {
        let avatars = sqlx::query_as::<_, Avatar>(&format!(
            r#"
            SELECT {AVATAR_COLUMNS} FROM avatars
            WHERE status = $1 AND training_started_at < $2
            ORDER BY training_started_at ASC
            "#
        ))
        .bind(AvatarStatus::Training)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(avatars)
    }
}
