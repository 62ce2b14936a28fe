//! Callback query handlers module
//!
//! This module contains handlers for all inline keyboard button callbacks

pub mod avatar;

use std::str::FromStr;
use std::sync::Arc;
use teloxide::{Bot, types::{CallbackQuery, ChatId}, prelude::*};
use tracing::{debug, warn};
use uuid::Uuid;
use crate::handlers::commands::avatar::{show_gallery, GalleryMove};
use crate::handlers::{current_user, language_for, reply_error};
use crate::models::AvatarGender;
use crate::state::AppContext;
use crate::utils::errors::{AishaError, Result};

/// Parsed inline button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Gender(AvatarGender),
    ConfirmPhotos(Uuid),
    StartTraining(Uuid),
    CancelAvatar(Uuid),
    Gallery(GalleryMove),
}

impl FromStr for CallbackAction {
    type Err = AishaError;

    fn from_str(data: &str) -> Result<Self> {
        let invalid = || AishaError::InvalidInput(format!("Unknown callback data: {}", data));
        let parts: Vec<&str> = data.split(':').collect();

        match parts.as_slice() {
            ["gender", gender] => AvatarGender::from_str(gender)
                .map(CallbackAction::Gender)
                .map_err(|_| invalid()),
            ["avatar", action, id] => {
                let avatar_id = Uuid::parse_str(id).map_err(|_| invalid())?;
                match *action {
                    "confirm" => Ok(CallbackAction::ConfirmPhotos(avatar_id)),
                    "train" => Ok(CallbackAction::StartTraining(avatar_id)),
                    "cancel" => Ok(CallbackAction::CancelAvatar(avatar_id)),
                    _ => Err(invalid()),
                }
            }
            ["gallery", "prev"] => Ok(CallbackAction::Gallery(GalleryMove::Prev)),
            ["gallery", "next"] => Ok(CallbackAction::Gallery(GalleryMove::Next)),
            ["gallery", "noop"] => Ok(CallbackAction::Gallery(GalleryMove::Stay)),
            _ => Err(invalid()),
        }
    }
}

/// Main callback query dispatcher
pub async fn handle_callback_query(bot: Bot, query: CallbackQuery, ctx: Arc<AppContext>) -> Result<()> {
    let telegram_id = query.from.id.0 as i64;
    let chat_id = query
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(telegram_id));
    let message_id = query.message.as_ref().map(|m| m.id());

    // Answer first to remove the loading state
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    debug!(telegram_id = telegram_id, callback_data = %data, "Processing callback query");

    let action = match data.parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            warn!(telegram_id = telegram_id, error = %e, "Ignoring callback");
            return Ok(());
        }
    };

    if action == CallbackAction::Gallery(GalleryMove::Stay) {
        return Ok(());
    }

    let user = match current_user(&ctx, Some(&query.from)).await {
        Ok(user) => user,
        Err(e) => {
            let lang = language_for(&ctx, Some(&query.from)).await;
            reply_error(&bot, &ctx, chat_id, &lang, &e).await;
            return Ok(());
        }
    };

    let result = match action {
        CallbackAction::Gender(gender) => avatar::handle_gender(&bot, &ctx, &user, chat_id, gender).await,
        CallbackAction::ConfirmPhotos(avatar_id) => avatar::handle_confirm(&bot, &ctx, &user, chat_id, avatar_id).await,
        CallbackAction::StartTraining(avatar_id) => avatar::handle_train(&bot, &ctx, &user, chat_id, avatar_id).await,
        CallbackAction::CancelAvatar(avatar_id) => avatar::handle_cancel(&bot, &ctx, &user, chat_id, avatar_id).await,
        CallbackAction::Gallery(movement) => show_gallery(&bot, &ctx, &user, chat_id, message_id, movement).await,
    };

    if let Err(e) = result {
        reply_error(&bot, &ctx, chat_id, &user.language_code, &e).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_gender() {
        assert_eq!(
            "gender:female".parse::<CallbackAction>().unwrap(),
            CallbackAction::Gender(AvatarGender::Female)
        );
        assert!("gender:other".parse::<CallbackAction>().is_err());
    }

    #[test]
    fn test_parse_avatar_actions() {
        let id = Uuid::new_v4();
        assert_eq!(
            format!("avatar:confirm:{}", id).parse::<CallbackAction>().unwrap(),
            CallbackAction::ConfirmPhotos(id)
        );
        assert_eq!(
            format!("avatar:train:{}", id).parse::<CallbackAction>().unwrap(),
            CallbackAction::StartTraining(id)
        );
        assert_eq!(
            format!("avatar:cancel:{}", id).parse::<CallbackAction>().unwrap(),
            CallbackAction::CancelAvatar(id)
        );
        assert_matches!("avatar:train:not-a-uuid".parse::<CallbackAction>(), Err(AishaError::InvalidInput(_)));
        assert!(format!("avatar:delete:{}", id).parse::<CallbackAction>().is_err());
    }

    #[test]
    fn test_parse_gallery() {
        assert_eq!("gallery:prev".parse::<CallbackAction>().unwrap(), CallbackAction::Gallery(GalleryMove::Prev));
        assert_eq!("gallery:next".parse::<CallbackAction>().unwrap(), CallbackAction::Gallery(GalleryMove::Next));
        assert!("gallery".parse::<CallbackAction>().is_err());
        assert!("".parse::<CallbackAction>().is_err());
    }
}
