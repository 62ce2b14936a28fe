//! Balance and ledger models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Balance {
    pub user_id: i64,
    pub coins: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction of a ledger entry, stored as TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    /// Ledger direction for a signed delta
    pub fn for_delta(delta: Decimal) -> Self {
        if delta > Decimal::ZERO {
            TransactionType::Credit
        } else {
            TransactionType::Debit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }
}

/// Append-only ledger entry; `amount` is signed
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: i64,
    pub amount: Decimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Unsigned size of the entry
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }
}

#[derive(Debug, Clone)]
pub struct CreateTransactionRequest {
    pub user_id: i64,
    pub amount: Decimal,
    pub description: String,
}

/// Result of comparing a balance with its ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub user_id: i64,
    pub balance: Decimal,
    pub transactions_sum: Decimal,
    pub consistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_for_delta() {
        assert_eq!(TransactionType::for_delta(Decimal::from(5)), TransactionType::Credit);
        assert_eq!(TransactionType::for_delta(Decimal::from(-5)), TransactionType::Debit);
        assert_eq!(TransactionType::Debit.as_str(), "debit");
    }

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_string(&TransactionType::Credit).unwrap();
        assert_eq!(json, "\"credit\"");
    }
}
