//! User repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::user::{User, CreateUserRequest, UpdateUserRequest};
use crate::utils::errors::AishaError;

const USER_COLUMNS: &str =
    "id, telegram_id, username, first_name, last_name, language_code, is_premium, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a user, or return the existing row for the same Telegram id
    pub async fn create(&self, request: CreateUserRequest) -> Result<User, AishaError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (telegram_id, username, first_name, last_name, language_code, is_premium, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (telegram_id) DO UPDATE SET telegram_id = EXCLUDED.telegram_id
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(request.telegram_id)
        .bind(request.username)
        .bind(request.first_name)
        .bind(request.last_name)
        .bind(request.language_code.unwrap_or_else(|| "ru".to_string()))
        .bind(request.is_premium)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, AishaError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by Telegram ID
    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, AishaError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = $1"))
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Update profile fields; `None` keeps the stored value
    pub async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, AishaError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                language_code = COALESCE($5, language_code),
                is_premium = COALESCE($6, is_premium),
                updated_at = $7
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.username)
        .bind(request.first_name)
        .bind(request.last_name)
        .bind(request.language_code)
        .bind(request.is_premium)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AishaError::UserNotFound { user_id: id })?;

        Ok(user)
    }

    /// Delete user; owned rows go with it through cascading keys
    pub async fn delete(&self, id: i64) -> Result<bool, AishaError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
