//! Admin command handlers

use rust_decimal::Decimal;
use teloxide::{Bot, types::{Message, ParseMode}, prelude::*};
use tracing::{debug, info, warn};
use crate::handlers::current_user;
use crate::i18n::params;
use crate::state::AppContext;
use crate::utils::errors::{AishaError, Result};
use crate::utils::helpers::{format_coins, parse_coin_amount};
use crate::utils::logging::log_user_action;

/// Parse `<telegram_id> <amount>`
pub fn parse_topup_args(args: &str) -> Option<(i64, Decimal)> {
    let mut parts = args.split_whitespace();
    let telegram_id = parts.next()?.parse::<i64>().ok()?;
    let amount = parse_coin_amount(parts.next()?)?;

    if parts.next().is_some() {
        return None;
    }
    Some((telegram_id, amount))
}

/// Handle /topup command (admin only)
pub async fn handle_topup(bot: Bot, msg: Message, ctx: &AppContext, args: &str) -> Result<()> {
    let admin = current_user(ctx, msg.from.as_ref()).await?;
    let lang = admin.language_code.clone();

    if !ctx.settings.is_admin(admin.telegram_id) {
        warn!(telegram_id = admin.telegram_id, "Non-admin tried /topup");
        return Err(AishaError::PermissionDenied("topup".to_string()));
    }

    let Some((telegram_id, amount)) = parse_topup_args(args) else {
        debug!(args = %args, "Invalid /topup arguments");
        bot.send_message(msg.chat.id, ctx.i18n.t("balance.topup_usage", &lang, None)).await?;
        return Ok(());
    };

    let target = ctx.users.require_by_telegram_id(telegram_id).await?;
    let description = format!("Top-up by admin {}", admin.telegram_id);
    let balance = ctx.ledger.credit(target.id, amount, &description).await?;

    log_user_action(admin.telegram_id, "topup", Some(&format!("{} -> {}", amount, telegram_id)));
    info!(admin = admin.telegram_id, target = telegram_id, amount = %amount, balance = %balance, "Balance topped up");

    let p = params([
        ("user", target.display_name()),
        ("amount", format_coins(amount)),
        ("balance", format_coins(balance)),
    ]);
    bot.send_message(msg.chat.id, ctx.i18n.t("balance.topup_done", &lang, Some(&p)))
        .parse_mode(ParseMode::Html)
        .await?;

    if let Err(e) = ctx.notifications.notify_balance_credited(&target, amount, balance).await {
        warn!(target = telegram_id, error = %e, "Failed to notify topped up user");
    }

    Ok(())
}
