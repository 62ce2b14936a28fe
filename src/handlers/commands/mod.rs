//! Command handlers module
//!
//! This module contains handlers for all bot commands like /start, /balance, etc.

pub mod admin;
pub mod avatar;
pub mod balance;
pub mod start;

use std::sync::Arc;
use teloxide::{Bot, types::Message, utils::command::BotCommands};
use crate::state::AppContext;
use crate::utils::errors::Result;

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Aisha commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Show your coin balance")]
    Balance,
    #[command(description = "Show recent balance operations")]
    History,
    #[command(description = "Create a new avatar")]
    Avatar,
    #[command(description = "Browse your avatars")]
    Avatars,
    #[command(description = "Cancel the current action")]
    Cancel,
    #[command(description = "Top up a user's balance (admin only)")]
    Topup(String),
}

/// Main command dispatcher
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, ctx: Arc<AppContext>) -> Result<()> {
    match cmd {
        Command::Start => start::handle_start(bot, msg, &ctx).await,
        Command::Help => start::handle_help(bot, msg, &ctx).await,
        Command::Balance => balance::handle_balance(bot, msg, &ctx).await,
        Command::History => balance::handle_history(bot, msg, &ctx).await,
        Command::Avatar => avatar::handle_new_avatar(bot, msg, &ctx).await,
        Command::Avatars => avatar::handle_gallery(bot, msg, &ctx).await,
        Command::Cancel => avatar::handle_cancel(bot, msg, &ctx).await,
        Command::Topup(args) => admin::handle_topup(bot, msg, &ctx, &args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/balance", "aisha_bot").unwrap(), Command::Balance);
        assert_eq!(Command::parse("/avatars", "aisha_bot").unwrap(), Command::Avatars);
        assert_eq!(
            Command::parse("/topup 42 100", "aisha_bot").unwrap(),
            Command::Topup("42 100".to_string())
        );
        assert!(Command::parse("/events", "aisha_bot").is_err());
    }
}
