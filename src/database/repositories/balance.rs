//! Balance repository implementation
//!
//! Mutating methods take a connection so the ledger service can run them
//! inside one database transaction together with the row lock.

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use rust_decimal::Decimal;
use crate::models::balance::Balance;
use crate::utils::errors::AishaError;

#[derive(Clone, Debug)]
pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a zero balance row if the user has none yet
    pub async fn ensure_exists(&self, conn: &mut PgConnection, user_id: i64) -> Result<(), AishaError> {
        sqlx::query(
            r#"
            INSERT INTO user_balances (user_id, coins, created_at, updated_at)
            VALUES ($1, 0, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Read the balance and hold its row lock until the surrounding transaction ends
    pub async fn lock_for_update(&self, conn: &mut PgConnection, user_id: i64) -> Result<Decimal, AishaError> {
        let coins: (Decimal,) = sqlx::query_as(
            "SELECT coins FROM user_balances WHERE user_id = $1 FOR UPDATE"
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(coins.0)
    }

    /// Overwrite the coin amount of a locked row
    pub async fn set_coins(&self, conn: &mut PgConnection, user_id: i64, coins: Decimal) -> Result<Balance, AishaError> {
        let balance = sqlx::query_as::<_, Balance>(
            r#"
            UPDATE user_balances
            SET coins = $2, updated_at = $3
            WHERE user_id = $1
            RETURNING user_id, coins, created_at, updated_at
            "#
        )
        .bind(user_id)
        .bind(coins)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(balance)
    }

    /// Find balance row without locking
    pub async fn find(&self, user_id: i64) -> Result<Option<Balance>, AishaError> {
        let balance = sqlx::query_as::<_, Balance>(
            "SELECT user_id, coins, created_at, updated_at FROM user_balances WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Users that own a balance row
    pub async fn list_user_ids(&self) -> Result<Vec<i64>, AishaError> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT user_id FROM user_balances ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
