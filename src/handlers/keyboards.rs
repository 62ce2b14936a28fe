//! Inline keyboards used by the bot

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use uuid::Uuid;
use crate::i18n::{params, I18n};
use crate::models::{Avatar, AvatarStatus};
use crate::utils::helpers::format_coins;
use rust_decimal::Decimal;

pub fn gender_keyboard(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(i18n.t("avatar.gender_male", lang, None), "gender:male"),
        InlineKeyboardButton::callback(i18n.t("avatar.gender_female", lang, None), "gender:female"),
    ]])
}

/// Shown once enough photos are uploaded
pub fn confirm_photos_keyboard(i18n: &I18n, lang: &str, avatar_id: Uuid) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            i18n.t("avatar.confirm_button", lang, None),
            format!("avatar:confirm:{}", avatar_id),
        )],
        vec![cancel_button(i18n, lang, avatar_id)],
    ])
}

pub fn train_keyboard(i18n: &I18n, lang: &str, avatar_id: Uuid, cost: Decimal) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![train_button(i18n, lang, avatar_id, cost)],
        vec![cancel_button(i18n, lang, avatar_id)],
    ])
}

/// Navigation row plus the actions the shown avatar allows
pub fn gallery_keyboard(
    i18n: &I18n,
    lang: &str,
    avatar: &Avatar,
    index: usize,
    total: usize,
    min_photos: i32,
    training_cost: Decimal,
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();

    if total > 1 {
        rows.push(vec![
            InlineKeyboardButton::callback("◀️", "gallery:prev"),
            InlineKeyboardButton::callback(format!("{}/{}", index + 1, total), "gallery:noop"),
            InlineKeyboardButton::callback("▶️", "gallery:next"),
        ]);
    }

    match avatar.status {
        AvatarStatus::PhotosUploading if avatar.photos_count >= min_photos => {
            rows.push(vec![InlineKeyboardButton::callback(
                i18n.t("avatar.confirm_button", lang, None),
                format!("avatar:confirm:{}", avatar.id),
            )]);
        }
        AvatarStatus::ReadyForTraining => {
            rows.push(vec![train_button(i18n, lang, avatar.id, training_cost)]);
        }
        _ => {}
    }

    if !avatar.status.is_terminal() && avatar.status != AvatarStatus::Training {
        rows.push(vec![cancel_button(i18n, lang, avatar.id)]);
    }

    InlineKeyboardMarkup::new(rows)
}

fn train_button(i18n: &I18n, lang: &str, avatar_id: Uuid, cost: Decimal) -> InlineKeyboardButton {
    let p = params([("cost", format_coins(cost))]);
    InlineKeyboardButton::callback(
        i18n.t("avatar.train_button", lang, Some(&p)),
        format!("avatar:train:{}", avatar_id),
    )
}

fn cancel_button(i18n: &I18n, lang: &str, avatar_id: Uuid) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(
        i18n.t("avatar.cancel_button", lang, None),
        format!("avatar:cancel:{}", avatar_id),
    )
}
