//! Balance command handlers

use teloxide::{Bot, types::{Message, ParseMode}, prelude::*};
use tracing::debug;
use crate::handlers::current_user;
use crate::i18n::{params, I18n};
use crate::models::Transaction;
use crate::state::AppContext;
use crate::utils::errors::Result;
use crate::utils::helpers::{format_coins, format_timestamp};

const HISTORY_LIMIT: i64 = 10;

/// Handle /balance command
pub async fn handle_balance(bot: Bot, msg: Message, ctx: &AppContext) -> Result<()> {
    let user = current_user(ctx, msg.from.as_ref()).await?;
    let balance = ctx.ledger.get_balance(user.id).await?;
    debug!(user_id = user.id, balance = %balance, "Showing balance");

    let p = params([("balance", format_coins(balance))]);
    let text = ctx.i18n.t("balance.current", &user.language_code, Some(&p));

    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

/// Handle /history command
pub async fn handle_history(bot: Bot, msg: Message, ctx: &AppContext) -> Result<()> {
    let user = current_user(ctx, msg.from.as_ref()).await?;
    let transactions = ctx.ledger.history(user.id, HISTORY_LIMIT).await?;

    let text = format_history(&ctx.i18n, &user.language_code, &transactions);
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

/// Render ledger entries, newest first
pub fn format_history(i18n: &I18n, lang: &str, transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return i18n.t("balance.history_empty", lang, None);
    }

    let mut text = i18n.t("balance.history_title", lang, None);
    for transaction in transactions {
        let sign = if transaction.amount.is_sign_negative() { "−" } else { "+" };
        let p = params([
            ("date", format_timestamp(transaction.created_at)),
            ("amount", format!("{}{}", sign, format_coins(transaction.magnitude()))),
            ("description", transaction.description.clone()),
        ]);
        text.push('\n');
        text.push_str(&i18n.t("balance.history_entry", lang, Some(&p)));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;
    use crate::config::I18nConfig;
    use crate::models::TransactionType;

    fn i18n() -> I18n {
        let mut i18n = I18n::new(&I18nConfig::default());
        i18n.load_language(
            "ru",
            r#"{"balance": {
                "history_title": "История:",
                "history_empty": "Операций нет",
                "history_entry": "{date} {amount} {description}"
            }}"#,
        )
        .unwrap();
        i18n
    }

    fn transaction(amount: Decimal, description: &str) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: 1,
            amount,
            kind: TransactionType::for_delta(amount),
            description: description.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(format_history(&i18n(), "ru", &[]), "Операций нет");
    }

    #[test]
    fn test_history_signs() {
        let text = format_history(
            &i18n(),
            "ru",
            &[
                transaction(Decimal::from(-15), "Transcription: 3 min"),
                transaction(Decimal::from(100), "Top-up"),
            ],
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "История:");
        assert_eq!(lines[1], "2024-06-01 12:30 UTC −15 Transcription: 3 min");
        assert_eq!(lines[2], "2024-06-01 12:30 UTC +100 Top-up");
    }
}
