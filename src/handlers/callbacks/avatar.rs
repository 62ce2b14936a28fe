//! Avatar wizard callbacks

use teloxide::{Bot, types::{ChatId, ParseMode}, prelude::*};
use tracing::{debug, info};
use uuid::Uuid;
use crate::handlers::commands::avatar::wizard_avatar_id;
use crate::handlers::keyboards;
use crate::i18n::params;
use crate::models::{AvatarGender, User};
use crate::state::{scenarios, AppContext};
use crate::utils::errors::{AishaError, Result};
use crate::utils::helpers::format_coins;
use crate::utils::logging::log_user_action;

/// Gender chosen: create the draft avatar and ask for photos
pub async fn handle_gender(bot: &Bot, ctx: &AppContext, user: &User, chat_id: ChatId, gender: AvatarGender) -> Result<()> {
    let lang = user.language_code.as_str();
    let mut session = ctx.load_session(user.telegram_id).await?;

    if !session.is_at(scenarios::AVATAR_CREATION, scenarios::STEP_GENDER) {
        debug!(telegram_id = user.telegram_id, "Gender chosen outside the wizard");
        return Err(AishaError::InvalidStateTransition {
            from: session.step.clone().unwrap_or_else(|| "none".to_string()),
            to: scenarios::STEP_PHOTOS.to_string(),
        });
    }

    let name = session
        .get_string(scenarios::KEY_NAME)
        .ok_or_else(|| AishaError::InvalidInput("avatar name missing from session".to_string()))?;
    let avatar = ctx.avatars.create_avatar(user.id, &name, gender).await?;

    session.set_data(scenarios::KEY_AVATAR_ID, avatar.id.to_string())?;
    session.next_step(scenarios::STEP_PHOTOS)?;
    session.touch(ctx.session_ttl());
    ctx.sessions.save(&session).await?;

    log_user_action(user.telegram_id, "avatar_created", Some(&avatar.id.to_string()));

    let p = params([
        ("name", avatar.name.clone()),
        ("min", ctx.avatars.min_photos().to_string()),
        ("max", ctx.avatars.max_photos().to_string()),
    ]);
    bot.send_message(chat_id, ctx.i18n.t("avatar.send_photos", lang, Some(&p)))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Photos confirmed: offer training
pub async fn handle_confirm(bot: &Bot, ctx: &AppContext, user: &User, chat_id: ChatId, avatar_id: Uuid) -> Result<()> {
    let lang = user.language_code.as_str();
    ctx.avatars.get_owned_avatar(user.id, avatar_id).await?;
    let avatar = ctx.avatars.confirm_photos(avatar_id).await?;

    let session = ctx.load_session(user.telegram_id).await?;
    if wizard_avatar_id(&session) == Some(avatar_id) {
        ctx.sessions.delete(user.telegram_id).await?;
    }

    let cost = ctx.avatars.training_cost();
    let p = params([
        ("name", avatar.name.clone()),
        ("photos", avatar.photos_count.to_string()),
        ("cost", format_coins(cost)),
    ]);
    bot.send_message(chat_id, ctx.i18n.t("avatar.confirmed", lang, Some(&p)))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::train_keyboard(&ctx.i18n, lang, avatar_id, cost))
        .await?;
    Ok(())
}

/// Pay for and submit training
pub async fn handle_train(bot: &Bot, ctx: &AppContext, user: &User, chat_id: ChatId, avatar_id: Uuid) -> Result<()> {
    let lang = user.language_code.as_str();
    ctx.avatars.get_owned_avatar(user.id, avatar_id).await?;

    let avatar = ctx.avatars
        .start_training(avatar_id, &ctx.settings.training_webhook_url())
        .await?;
    let balance = ctx.ledger.get_balance(user.id).await?;

    log_user_action(user.telegram_id, "avatar_training_started", Some(&avatar_id.to_string()));
    info!(avatar_id = %avatar_id, user_id = user.id, "Training started from bot");

    let p = params([
        ("name", avatar.name.clone()),
        ("balance", format_coins(balance)),
    ]);
    bot.send_message(chat_id, ctx.i18n.t("avatar.training_started", lang, Some(&p)))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Cancel an avatar from a button
pub async fn handle_cancel(bot: &Bot, ctx: &AppContext, user: &User, chat_id: ChatId, avatar_id: Uuid) -> Result<()> {
    let lang = user.language_code.as_str();
    ctx.avatars.get_owned_avatar(user.id, avatar_id).await?;
    let avatar = ctx.avatars.cancel_avatar(avatar_id).await?;

    let session = ctx.load_session(user.telegram_id).await?;
    if wizard_avatar_id(&session) == Some(avatar_id) {
        ctx.sessions.delete(user.telegram_id).await?;
    }

    log_user_action(user.telegram_id, "avatar_cancelled", Some(&avatar_id.to_string()));

    let p = params([("name", avatar.name)]);
    bot.send_message(chat_id, ctx.i18n.t("avatar.cancelled", lang, Some(&p))).await?;
    Ok(())
}
