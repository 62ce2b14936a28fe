//! Avatar wizard and gallery command handlers

use teloxide::{Bot, types::{ChatId, Message, MessageId, ParseMode}, prelude::*};
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::handlers::{current_user, keyboards};
use crate::i18n::{params, I18n};
use crate::models::{Avatar, AvatarStatus, User};
use crate::state::{scenarios, AppContext};
use crate::utils::errors::{AishaError, Result};
use crate::utils::helpers::format_timestamp;
use crate::utils::logging::log_user_action;

/// Which gallery entry to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryMove {
    First,
    Prev,
    Next,
    Stay,
}

/// Wrap-around position after a move
pub fn gallery_index(current: i64, movement: GalleryMove, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as i64;
    let next = match movement {
        GalleryMove::First => 0,
        GalleryMove::Prev => current - 1,
        GalleryMove::Next => current + 1,
        GalleryMove::Stay => current,
    };
    next.rem_euclid(len) as usize
}

/// Card text for one avatar
pub fn gallery_text(i18n: &I18n, lang: &str, avatar: &Avatar) -> String {
    let p = params([
        ("name", avatar.name.clone()),
        ("status", i18n.t(&format!("status.{}", avatar.status.as_str()), lang, None)),
        ("photos", avatar.photos_count.to_string()),
        ("created", format_timestamp(avatar.created_at)),
    ]);
    let mut text = i18n.t("gallery.card", lang, Some(&p));

    if avatar.status == AvatarStatus::Completed {
        let p = params([("trigger_word", avatar.trigger_word.clone())]);
        text.push('\n');
        text.push_str(&i18n.t("gallery.trigger_word", lang, Some(&p)));
    }
    if let Some(error) = avatar.error_message.as_deref().filter(|_| avatar.status == AvatarStatus::Error) {
        let p = params([("error", error.to_string())]);
        text.push('\n');
        text.push_str(&i18n.t("gallery.error", lang, Some(&p)));
    }
    text
}

/// Avatar id remembered by the creation wizard
pub fn wizard_avatar_id(session: &crate::state::ConversationContext) -> Option<Uuid> {
    session
        .get_string(scenarios::KEY_AVATAR_ID)
        .and_then(|id| Uuid::parse_str(&id).ok())
}

/// Handle /avatar: start the creation wizard
pub async fn handle_new_avatar(bot: Bot, msg: Message, ctx: &AppContext) -> Result<()> {
    let user = current_user(ctx, msg.from.as_ref()).await?;

    let mut session = ctx.load_session(user.telegram_id).await?;
    if let Some(previous) = wizard_avatar_id(&session) {
        abandon_draft(ctx, previous).await;
    }
    session.start_scenario(scenarios::AVATAR_CREATION, scenarios::STEP_NAME, ctx.session_ttl());
    ctx.sessions.save(&session).await?;

    log_user_action(user.telegram_id, "avatar_wizard_started", None);
    bot.send_message(msg.chat.id, ctx.i18n.t("avatar.ask_name", &user.language_code, None)).await?;
    Ok(())
}

/// Handle /avatars: show the first gallery card
pub async fn handle_gallery(bot: Bot, msg: Message, ctx: &AppContext) -> Result<()> {
    let user = current_user(ctx, msg.from.as_ref()).await?;
    show_gallery(&bot, ctx, &user, msg.chat.id, None, GalleryMove::First).await
}

/// Handle /cancel: leave the wizard and cancel its draft avatar
pub async fn handle_cancel(bot: Bot, msg: Message, ctx: &AppContext) -> Result<()> {
    let user = current_user(ctx, msg.from.as_ref()).await?;
    let session = ctx.load_session(user.telegram_id).await?;

    let key = if session.is_in_scenario(scenarios::AVATAR_CREATION) {
        if let Some(avatar_id) = wizard_avatar_id(&session) {
            abandon_draft(ctx, avatar_id).await;
        }
        "avatar.wizard_cancelled"
    } else {
        "common.nothing_to_cancel"
    };

    ctx.sessions.delete(user.telegram_id).await?;
    bot.send_message(msg.chat.id, ctx.i18n.t(key, &user.language_code, None)).await?;
    Ok(())
}

/// Cancel a wizard avatar that never reached training
async fn abandon_draft(ctx: &AppContext, avatar_id: Uuid) {
    match ctx.avatars.cancel_avatar(avatar_id).await {
        Ok(_) => info!(avatar_id = %avatar_id, "Draft avatar abandoned"),
        Err(AishaError::InvalidStateTransition { from, .. }) => {
            debug!(avatar_id = %avatar_id, status = %from, "Wizard avatar already finished");
        }
        Err(e) => warn!(avatar_id = %avatar_id, error = %e, "Failed to cancel draft avatar"),
    }
}

/// Send or edit the gallery card after `movement`
pub async fn show_gallery(
    bot: &Bot,
    ctx: &AppContext,
    user: &User,
    chat_id: ChatId,
    edit: Option<MessageId>,
    movement: GalleryMove,
) -> Result<()> {
    let lang = user.language_code.as_str();
    let avatars = ctx.avatars.list_avatars(user.id).await?;

    if avatars.is_empty() {
        bot.send_message(chat_id, ctx.i18n.t("gallery.empty", lang, None)).await?;
        return Ok(());
    }

    let mut session = ctx.load_session(user.telegram_id).await?;
    let current = session.get_i64(scenarios::KEY_GALLERY_INDEX).unwrap_or(0);
    let index = gallery_index(current, movement, avatars.len());
    session.set_data(scenarios::KEY_GALLERY_INDEX, index as i64)?;
    if session.scenario.is_none() {
        session.touch(ctx.session_ttl());
    }
    ctx.sessions.save(&session).await?;

    let avatar = &avatars[index];
    let text = gallery_text(&ctx.i18n, lang, avatar);
    let keyboard = keyboards::gallery_keyboard(
        &ctx.i18n,
        lang,
        avatar,
        index,
        avatars.len(),
        ctx.avatars.min_photos(),
        ctx.avatars.training_cost(),
    );

    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
    }

    debug!(user_id = user.id, index = index, total = avatars.len(), "Gallery shown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::config::I18nConfig;
    use crate::models::AvatarGender;
    use crate::state::ConversationContext;

    fn i18n() -> I18n {
        let mut i18n = I18n::new(&I18nConfig::default());
        i18n.load_language(
            "en",
            r#"{
                "gallery": {
                    "card": "{name} [{status}] {photos} photos",
                    "trigger_word": "Trigger: {trigger_word}",
                    "error": "Error: {error}"
                },
                "status": {"completed": "ready", "error": "failed", "draft": "draft"}
            }"#,
        )
        .unwrap();
        i18n
    }

    fn avatar(status: AvatarStatus) -> Avatar {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        Avatar {
            id: Uuid::new_v4(),
            user_id: 1,
            name: "Anna".to_string(),
            gender: AvatarGender::Female,
            status,
            trigger_word: "TOK_ABC123".to_string(),
            training_steps: 1000,
            photos_count: 12,
            fal_request_id: None,
            diffusers_lora_file_url: None,
            config_file_url: None,
            error_message: Some("bad photos".to_string()),
            training_started_at: None,
            training_completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_gallery_index_wraps() {
        assert_eq!(gallery_index(0, GalleryMove::Prev, 3), 2);
        assert_eq!(gallery_index(2, GalleryMove::Next, 3), 0);
        assert_eq!(gallery_index(7, GalleryMove::Stay, 3), 1);
        assert_eq!(gallery_index(5, GalleryMove::First, 3), 0);
        assert_eq!(gallery_index(5, GalleryMove::Next, 0), 0);
    }

    #[test]
    fn test_gallery_text_by_status() {
        let i18n = i18n();

        let completed = gallery_text(&i18n, "en", &avatar(AvatarStatus::Completed));
        assert_eq!(completed, "Anna [ready] 12 photos\nTrigger: TOK_ABC123");

        let failed = gallery_text(&i18n, "en", &avatar(AvatarStatus::Error));
        assert_eq!(failed, "Anna [failed] 12 photos\nError: bad photos");

        let draft = gallery_text(&i18n, "en", &avatar(AvatarStatus::Draft));
        assert_eq!(draft, "Anna [draft] 12 photos");
    }

    #[test]
    fn test_wizard_avatar_id() {
        let mut session = ConversationContext::new(1);
        assert_eq!(wizard_avatar_id(&session), None);

        let id = Uuid::new_v4();
        session.set_data(scenarios::KEY_AVATAR_ID, id.to_string()).unwrap();
        assert_eq!(wizard_avatar_id(&session), Some(id));

        session.set_data(scenarios::KEY_AVATAR_ID, "garbage").unwrap();
        assert_eq!(wizard_avatar_id(&session), None);
    }
}
