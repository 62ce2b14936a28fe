//! Persisted wizard session row

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserState {
    pub telegram_id: i64,
    pub scenario: Option<String>,
    pub step: Option<String>,
    pub data: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
