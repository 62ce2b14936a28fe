//! Start and help command handlers

use teloxide::{Bot, types::{Message, ParseMode}, prelude::*};
use tracing::{debug, info};
use crate::handlers::current_user;
use crate::i18n::params;
use crate::state::AppContext;
use crate::utils::errors::Result;
use crate::utils::helpers::format_coins;
use crate::utils::logging::log_user_action;

/// Handle /start: register the user and greet them with their balance
pub async fn handle_start(bot: Bot, msg: Message, ctx: &AppContext) -> Result<()> {
    let user = current_user(ctx, msg.from.as_ref()).await?;
    debug!(user_id = user.id, telegram_id = user.telegram_id, "Processing /start command");

    let balance = ctx.ledger.get_balance(user.id).await?;
    let p = params([
        ("name", user.display_name()),
        ("balance", format_coins(balance)),
    ]);
    let text = ctx.i18n.t("commands.start.welcome", &user.language_code, Some(&p));

    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;

    log_user_action(user.telegram_id, "start", None);
    info!(user_id = user.id, "User started the bot");
    Ok(())
}

/// Handle /help command
pub async fn handle_help(bot: Bot, msg: Message, ctx: &AppContext) -> Result<()> {
    let user = current_user(ctx, msg.from.as_ref()).await?;

    let p = params([
        ("training_cost", format_coins(ctx.avatars.training_cost())),
        ("minute_cost", format_coins(ctx.transcription.cost_for(60))),
        ("min_photos", ctx.avatars.min_photos().to_string()),
        ("max_photos", ctx.avatars.max_photos().to_string()),
    ]);
    let text = ctx.i18n.t("commands.help", &user.language_code, Some(&p));

    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}
