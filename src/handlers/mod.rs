//! Bot handlers module
//!
//! This module contains all Telegram bot handlers organized by type:
//! - Command handlers for bot commands
//! - Callback handlers for inline keyboard interactions
//! - Message handlers for text, photo and audio messages

pub mod callbacks;
pub mod commands;
pub mod keyboards;
pub mod messages;

pub use callbacks::{handle_callback_query, CallbackAction};
pub use commands::{handle_command, Command};
pub use messages::handle_message;

use teloxide::{prelude::*, types::ChatId};
use tracing::{error, info, warn};
use crate::i18n::{params, I18n};
use crate::models::User;
use crate::services::TelegramProfile;
use crate::state::AppContext;
use crate::utils::errors::{AishaError, ErrorSeverity, Result};
use crate::utils::helpers::format_coins;

/// Apology shown to the user for a failed request
pub fn error_text(i18n: &I18n, lang: &str, error: &AishaError) -> String {
    let p = match error {
        AishaError::InsufficientFunds { required, available } => params([
            ("required", format_coins(*required)),
            ("available", format_coins(*available)),
        ]),
        _ => params([]),
    };
    i18n.t(error.user_message_key(), lang, Some(&p))
}

/// Log a handler failure and tell the user about it
pub async fn reply_error(bot: &Bot, ctx: &AppContext, chat_id: ChatId, lang: &str, error: &AishaError) {
    match error.severity() {
        ErrorSeverity::Info => info!(chat_id = ?chat_id, error = %error, "Request rejected"),
        ErrorSeverity::Warning => warn!(chat_id = ?chat_id, error = %error, "Request failed"),
        _ => error!(chat_id = ?chat_id, error = %error, "Handler error"),
    }

    let text = error_text(&ctx.i18n, lang, error);
    if let Err(e) = bot.send_message(chat_id, text).await {
        error!(chat_id = ?chat_id, error = %e, "Failed to deliver error message");
    }
}

/// Register the sender or refresh their profile
pub async fn current_user(ctx: &AppContext, from: Option<&teloxide::types::User>) -> Result<User> {
    let from = from.ok_or_else(|| AishaError::InvalidInput("No user in update".to_string()))?;
    ctx.users.register_or_get_user(&TelegramProfile::from(from)).await
}

/// Language to answer in when the user record is not at hand
pub async fn language_for(ctx: &AppContext, from: Option<&teloxide::types::User>) -> String {
    let Some(from) = from else {
        return ctx.i18n.default_language().to_string();
    };

    match ctx.users.get_user_by_telegram_id(from.id.0 as i64).await {
        Ok(Some(user)) => user.language_code,
        _ => ctx.i18n.detect_user_language(from.language_code.as_deref()),
    }
}
