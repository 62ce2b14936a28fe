//! User state repository implementation
//!
//! Backs the postgres session store.

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::state::UserState;
use crate::utils::errors::AishaError;

#[derive(Clone, Debug)]
pub struct UserStateRepository {
    pool: PgPool,
}

impl UserStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or overwrite the state of a user
    pub async fn upsert(
        &self,
        telegram_id: i64,
        scenario: Option<&str>,
        step: Option<&str>,
        data: serde_json::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<UserState, AishaError> {
        let state = sqlx::query_as::<_, UserState>(
            r#"
            INSERT INTO user_states (telegram_id, scenario, step, data, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (telegram_id)
            DO UPDATE SET
                scenario = EXCLUDED.scenario,
                step = EXCLUDED.step,
                data = EXCLUDED.data,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            RETURNING telegram_id, scenario, step, data, expires_at, updated_at
            "#
        )
        .bind(telegram_id)
        .bind(scenario)
        .bind(step)
        .bind(data)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(state)
    }

    /// Get a non-expired state
    pub async fn get(&self, telegram_id: i64) -> Result<Option<UserState>, AishaError> {
        let state = sqlx::query_as::<_, UserState>(
            r#"
            SELECT telegram_id, scenario, step, data, expires_at, updated_at
            FROM user_states
            WHERE telegram_id = $1 AND (expires_at IS NULL OR expires_at > NOW())
            "#
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    pub async fn delete(&self, telegram_id: i64) -> Result<(), AishaError> {
        sqlx::query("DELETE FROM user_states WHERE telegram_id = $1")
            .bind(telegram_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Clean expired user states
    pub async fn clean_expired(&self) -> Result<u64, AishaError> {
        let result = sqlx::query(
            "DELETE FROM user_states WHERE expires_at IS NOT NULL AND expires_at < NOW()"
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
