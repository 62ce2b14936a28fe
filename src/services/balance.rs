//! Balance ledger service
//!
//! Every coin movement goes through [`LedgerService::adjust_balance`], which
//! locks the user's balance row, applies the delta and appends exactly one
//! transaction inside a single database transaction. The sum of a user's
//! transaction amounts therefore always equals their balance.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, info, warn};
use crate::database::DatabaseService;
use crate::models::balance::{CreateTransactionRequest, LedgerAudit, Transaction};
use crate::utils::errors::{AishaError, Result};
use crate::utils::logging::log_balance_change;

/// Compute the balance after applying `delta` to `current`
pub fn apply_delta(current: Decimal, delta: Decimal) -> Result<Decimal> {
    if delta.is_zero() {
        return Err(AishaError::InvalidInput("balance delta must not be zero".to_string()));
    }

    let next = current + delta;
    if next < Decimal::ZERO {
        return Err(AishaError::InsufficientFunds {
            required: -delta,
            available: current,
        });
    }

    Ok(next)
}

fn positive(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AishaError::InvalidInput(format!("amount must be positive, got {}", amount)));
    }
    Ok(amount)
}

/// Ledger over `user_balances` and `transactions`
#[derive(Clone)]
pub struct LedgerService {
    db: DatabaseService,
}

impl LedgerService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Current balance, creating a zero row on first access
    pub async fn get_balance(&self, user_id: i64) -> Result<Decimal> {
        if let Some(balance) = self.db.balances.find(user_id).await? {
            return Ok(balance.coins);
        }

        let mut tx = self.db.begin().await?;
        self.db.balances.ensure_exists(&mut tx, user_id).await.map_err(|e| missing_user(e, user_id))?;
        let coins = self.db.balances.lock_for_update(&mut tx, user_id).await?;
        tx.commit().await?;

        debug!(user_id = user_id, "Created empty balance");
        Ok(coins)
    }

    /// Apply a signed delta and record it; returns the new balance
    pub async fn adjust_balance(&self, user_id: i64, delta: Decimal, description: &str) -> Result<Decimal> {
        let mut tx = self.db.begin().await?;
        let balance = self.adjust_in(&mut tx, user_id, delta, description).await?;
        tx.commit().await?;

        log_balance_change(user_id, delta, balance, description);
        Ok(balance)
    }

    /// Debit inside a transaction owned by the caller; nothing is logged until they commit
    pub async fn charge_in(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        amount: Decimal,
        description: &str,
    ) -> Result<Decimal> {
        let amount = positive(amount)?;
        self.adjust_in(conn, user_id, -amount, description).await
    }

    async fn adjust_in(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        delta: Decimal,
        description: &str,
    ) -> Result<Decimal> {
        if delta.is_zero() {
            return Err(AishaError::InvalidInput("balance delta must not be zero".to_string()));
        }

        self.db.balances.ensure_exists(&mut *conn, user_id).await.map_err(|e| missing_user(e, user_id))?;

        let current = self.db.balances.lock_for_update(&mut *conn, user_id).await?;
        let next = match apply_delta(current, delta) {
            Ok(next) => next,
            Err(e) => {
                // the caller's transaction is rolled back on drop
                warn!(user_id = user_id, delta = %delta, balance = %current, "Balance adjustment rejected");
                return Err(e);
            }
        };

        let balance = self.db.balances.set_coins(&mut *conn, user_id, next).await?;
        self.db.transactions.insert(&mut *conn, CreateTransactionRequest {
            user_id,
            amount: delta,
            description: description.to_string(),
        }).await?;
        Ok(balance.coins)
    }

    /// Debit a positive amount
    pub async fn charge(&self, user_id: i64, amount: Decimal, description: &str) -> Result<Decimal> {
        let amount = positive(amount)?;
        self.adjust_balance(user_id, -amount, description).await
    }

    /// Credit a positive amount
    pub async fn credit(&self, user_id: i64, amount: Decimal, description: &str) -> Result<Decimal> {
        let amount = positive(amount)?;
        self.adjust_balance(user_id, amount, description).await
    }

    /// Return coins taken by an earlier charge
    pub async fn refund(&self, user_id: i64, amount: Decimal, reason: &str) -> Result<Decimal> {
        let balance = self.credit(user_id, amount, &format!("Refund: {}", reason)).await?;
        info!(user_id = user_id, amount = %amount, "Charge refunded");
        Ok(balance)
    }

    /// Most recent transactions first
    pub async fn history(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        self.db.transactions.list_for_user(user_id, limit.clamp(1, 100)).await
    }

    /// Compare the stored balance with the sum of the ledger
    pub async fn audit(&self, user_id: i64) -> Result<LedgerAudit> {
        let balance = self.db.balances.find(user_id).await?
            .map(|b| b.coins)
            .unwrap_or(Decimal::ZERO);
        let transactions_sum = self.db.transactions.sum_for_user(user_id).await?;

        let audit = LedgerAudit {
            user_id,
            balance,
            transactions_sum,
            consistent: balance == transactions_sum,
        };

        if !audit.consistent {
            warn!(user_id = user_id, balance = %balance, transactions_sum = %transactions_sum, "Ledger mismatch");
        }
        Ok(audit)
    }

    /// Audit every user that owns a balance row
    pub async fn audit_all(&self) -> Result<Vec<LedgerAudit>> {
        let mut audits = Vec::new();
        for user_id in self.db.balances.list_user_ids().await? {
            audits.push(self.audit(user_id).await?);
        }
        Ok(audits)
    }
}

fn missing_user(error: AishaError, user_id: i64) -> AishaError {
    match &error {
        AishaError::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
            AishaError::UserNotFound { user_id }
        }
        _ => error,
    }
}
