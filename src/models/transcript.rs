//! Transcript model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transcript {
    pub id: Uuid,
    pub user_id: i64,
    pub audio_key: String,
    pub transcript_key: String,
    pub duration_seconds: i32,
    pub cost: Decimal,
    pub language: Option<String>,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTranscriptRequest {
    pub id: Uuid,
    pub user_id: i64,
    pub audio_key: String,
    pub transcript_key: String,
    pub duration_seconds: i32,
    pub cost: Decimal,
    pub language: Option<String>,
    pub preview: String,
}
