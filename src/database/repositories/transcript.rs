//! Transcript repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::transcript::{Transcript, CreateTranscriptRequest};
use crate::utils::errors::AishaError;

const TRANSCRIPT_COLUMNS: &str =
    "id, user_id, audio_key, transcript_key, duration_seconds, cost, language, preview, created_at";

#[derive(Clone, Debug)]
pub struct TranscriptRepository {
    pool: PgPool,
}

impl TranscriptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateTranscriptRequest) -> Result<Transcript, AishaError> {
        let transcript = sqlx::query_as::<_, Transcript>(&format!(
            r#"
            INSERT INTO user_transcripts (id, user_id, audio_key, transcript_key, duration_seconds, cost, language, preview, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TRANSCRIPT_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.audio_key)
        .bind(request.transcript_key)
        .bind(request.duration_seconds)
        .bind(request.cost)
        .bind(request.language)
        .bind(request.preview)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(transcript)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Transcript>, AishaError> {
        let transcript = sqlx::query_as::<_, Transcript>(&format!(
            "SELECT {TRANSCRIPT_COLUMNS} FROM user_transcripts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transcript)
    }

    /// Newest first
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Transcript>, AishaError> {
        let transcripts = sqlx::query_as::<_, Transcript>(&format!(
            "SELECT {TRANSCRIPT_COLUMNS} FROM user_transcripts WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transcripts)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, AishaError> {
        let result = sqlx::query("DELETE FROM user_transcripts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
