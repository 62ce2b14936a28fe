//! Transaction log repository implementation
//!
//! Rows are only ever inserted; there is no update or delete.

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::models::balance::{Transaction, TransactionType, CreateTransactionRequest};
use crate::utils::errors::AishaError;

#[derive(Clone, Debug)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a ledger entry inside the caller's transaction
    pub async fn insert(&self, conn: &mut PgConnection, request: CreateTransactionRequest) -> Result<Transaction, AishaError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, user_id, amount, type, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, amount, type, description, created_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.amount)
        .bind(TransactionType::for_delta(request.amount))
        .bind(request.description)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(transaction)
    }

    /// Most recent entries first
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>, AishaError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, amount, type, description, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    /// Sum of all signed amounts for a user
    pub async fn sum_for_user(&self, user_id: i64) -> Result<Decimal, AishaError> {
        let sum: (Option<Decimal>,) = sqlx::query_as(
            "SELECT SUM(amount) FROM transactions WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.0.unwrap_or(Decimal::ZERO))
    }

    /// Count entries for a user, optionally of one direction
    pub async fn count_for_user(&self, user_id: i64, kind: Option<TransactionType>) -> Result<i64, AishaError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND ($2::text IS NULL OR type = $2)"
        )
        .bind(user_id)
        .bind(kind.map(|k| k.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
