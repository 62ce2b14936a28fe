//! Message handlers module
//!
//! Handles wizard text input, avatar photos and voice/audio messages for
//! paid transcription.

use std::sync::Arc;
use teloxide::net::Download;
use teloxide::{Bot, types::{FileMeta, Message, ParseMode}, prelude::*};
use tracing::{debug, info};
use crate::handlers::commands::avatar::wizard_avatar_id;
use crate::handlers::{current_user, keyboards};
use crate::i18n::params;
use crate::models::User;
use crate::services::{AudioInput, PhotoUpload};
use crate::state::{scenarios, AppContext, ConversationContext};
use crate::utils::errors::{AishaError, Result};
use crate::utils::helpers::{format_coins, format_duration, split_message};
use crate::services::avatar::validate_avatar_name;

/// Longest text Telegram accepts in one message
const MAX_MESSAGE_CHARS: usize = 4000;

/// Handle incoming messages
pub async fn handle_message(bot: Bot, msg: Message, ctx: Arc<AppContext>) -> Result<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }

    let user = current_user(&ctx, msg.from.as_ref()).await?;
    debug!(user_id = user.id, chat_id = ?msg.chat.id, "Processing message");

    if let Some(audio) = incoming_audio(&msg) {
        return handle_audio(&bot, &msg, &ctx, &user, audio).await;
    }

    let session = ctx.load_session(user.telegram_id).await?;
    if session.is_in_scenario(scenarios::AVATAR_CREATION) {
        return handle_wizard_message(&bot, &msg, &ctx, &user, session).await;
    }

    bot.send_message(msg.chat.id, ctx.i18n.t("common.unknown_message", &user.language_code, None)).await?;
    Ok(())
}

/// Audio attached to a message
#[derive(Debug, Clone)]
pub struct IncomingAudio {
    pub file: FileMeta,
    pub duration_seconds: u32,
    pub mime_type: String,
    pub file_name: String,
}

fn incoming_audio(msg: &Message) -> Option<IncomingAudio> {
    if let Some(voice) = msg.voice() {
        return Some(IncomingAudio {
            file: voice.file.clone(),
            duration_seconds: voice.duration.seconds(),
            mime_type: voice
                .mime_type
                .as_ref()
                .map(|m| m.essence_str().to_string())
                .unwrap_or_else(|| "audio/ogg".to_string()),
            file_name: "voice.ogg".to_string(),
        });
    }

    msg.audio().map(|audio| IncomingAudio {
        file: audio.file.clone(),
        duration_seconds: audio.duration.seconds(),
        mime_type: audio
            .mime_type
            .as_ref()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "audio/mpeg".to_string()),
        file_name: audio.file_name.clone().unwrap_or_else(|| "audio.mp3".to_string()),
    })
}

async fn download(bot: &Bot, file: &FileMeta) -> Result<Vec<u8>> {
    let file = bot.get_file(file.id.clone()).await?;
    let mut data = Vec::new();
    bot.download_file(&file.path, &mut data).await?;
    Ok(data)
}

/// Charge, transcribe and reply with the text
async fn handle_audio(bot: &Bot, msg: &Message, ctx: &AppContext, user: &User, audio: IncomingAudio) -> Result<()> {
    let lang = user.language_code.as_str();
    let cost = ctx.transcription.cost_for(audio.duration_seconds);

    let p = params([
        ("duration", format_duration(audio.duration_seconds)),
        ("cost", format_coins(cost)),
    ]);
    bot.send_message(msg.chat.id, ctx.i18n.t("transcription.processing", lang, Some(&p))).await?;

    let data = download(bot, &audio.file).await?;
    let result = ctx.transcription
        .transcribe_paid(user.id, AudioInput {
            data,
            file_name: audio.file_name,
            mime_type: audio.mime_type,
            duration_seconds: audio.duration_seconds,
        })
        .await?;

    if result.text.trim().is_empty() {
        bot.send_message(msg.chat.id, ctx.i18n.t("transcription.empty", lang, None)).await?;
    } else {
        for chunk in split_message(&result.text, MAX_MESSAGE_CHARS) {
            bot.send_message(msg.chat.id, chunk).await?;
        }
    }

    let p = params([
        ("cost", format_coins(result.transcript.cost)),
        ("balance", format_coins(result.balance)),
    ]);
    bot.send_message(msg.chat.id, ctx.i18n.t("transcription.cost_footer", lang, Some(&p)))
        .parse_mode(ParseMode::Html)
        .await?;

    info!(user_id = user.id, transcript_id = %result.transcript.id, "Transcription delivered");
    Ok(())
}

async fn handle_wizard_message(
    bot: &Bot,
    msg: &Message,
    ctx: &AppContext,
    user: &User,
    mut session: ConversationContext,
) -> Result<()> {
    let lang = user.language_code.as_str();

    match session.step.as_deref() {
        Some(scenarios::STEP_NAME) => {
            let Some(text) = msg.text() else {
                bot.send_message(msg.chat.id, ctx.i18n.t("avatar.ask_name", lang, None)).await?;
                return Ok(());
            };

            let name = match validate_avatar_name(text) {
                Ok(name) => name,
                Err(_) => {
                    bot.send_message(msg.chat.id, ctx.i18n.t("avatar.invalid_name", lang, None)).await?;
                    return Ok(());
                }
            };

            session.set_data(scenarios::KEY_NAME, &name)?;
            session.next_step(scenarios::STEP_GENDER)?;
            session.touch(ctx.session_ttl());
            ctx.sessions.save(&session).await?;

            let p = params([("name", name)]);
            bot.send_message(msg.chat.id, ctx.i18n.t("avatar.ask_gender", lang, Some(&p)))
                .reply_markup(keyboards::gender_keyboard(&ctx.i18n, lang))
                .await?;
        }
        Some(scenarios::STEP_GENDER) => {
            bot.send_message(msg.chat.id, ctx.i18n.t("avatar.choose_gender", lang, None))
                .reply_markup(keyboards::gender_keyboard(&ctx.i18n, lang))
                .await?;
        }
        Some(scenarios::STEP_PHOTOS) => {
            handle_photo(bot, msg, ctx, user, &mut session).await?;
        }
        step => {
            debug!(telegram_id = user.telegram_id, step = ?step, "Unexpected wizard step, resetting");
            ctx.sessions.delete(user.telegram_id).await?;
            bot.send_message(msg.chat.id, ctx.i18n.t("common.unknown_message", lang, None)).await?;
        }
    }

    Ok(())
}

/// Photo or image document sent during the photo step
fn incoming_photo(msg: &Message) -> Option<(FileMeta, Option<i32>, Option<i32>, String)> {
    if let Some(sizes) = msg.photo() {
        let largest = sizes.iter().max_by_key(|size| u64::from(size.width) * u64::from(size.height))?;
        return Some((
            largest.file.clone(),
            i32::try_from(largest.width).ok(),
            i32::try_from(largest.height).ok(),
            "image/jpeg".to_string(),
        ));
    }

    let document = msg.document()?;
    let mime = document.mime_type.as_ref()?;
    if mime.type_().as_str() != "image" {
        return None;
    }
    Some((document.file.clone(), None, None, mime.essence_str().to_string()))
}

async fn handle_photo(
    bot: &Bot,
    msg: &Message,
    ctx: &AppContext,
    user: &User,
    session: &mut ConversationContext,
) -> Result<()> {
    let lang = user.language_code.as_str();
    let avatar_id = wizard_avatar_id(session)
        .ok_or_else(|| AishaError::InvalidInput("avatar id missing from session".to_string()))?;

    let Some((file, width, height, content_type)) = incoming_photo(msg) else {
        let p = params([
            ("min", ctx.avatars.min_photos().to_string()),
            ("max", ctx.avatars.max_photos().to_string()),
        ]);
        bot.send_message(msg.chat.id, ctx.i18n.t("avatar.photos_expected", lang, Some(&p))).await?;
        return Ok(());
    };

    let data = download(bot, &file).await?;
    let photo = ctx.avatars
        .add_photo(avatar_id, PhotoUpload {
            telegram_file_unique_id: file.unique_id.to_string(),
            data,
            width,
            height,
            content_type,
        })
        .await?;

    session.touch(ctx.session_ttl());
    ctx.sessions.save(session).await?;

    let count = photo.upload_order;
    let min = ctx.avatars.min_photos();
    let max = ctx.avatars.max_photos();
    let p = params([
        ("photos", ctx.i18n.tp("avatar.photos", lang, i64::from(count), None)),
        ("min", min.to_string()),
        ("max", max.to_string()),
    ]);

    if count >= min {
        let key = if count >= max { "avatar.photo_limit_reached" } else { "avatar.photo_added_enough" };
        bot.send_message(msg.chat.id, ctx.i18n.t(key, lang, Some(&p)))
            .reply_markup(keyboards::confirm_photos_keyboard(&ctx.i18n, lang, avatar_id))
            .await?;
    } else {
        bot.send_message(msg.chat.id, ctx.i18n.t("avatar.photo_added", lang, Some(&p))).await?;
    }
    Ok(())
}

