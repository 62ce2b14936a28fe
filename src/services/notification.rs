//! Notification service implementation
//!
//! Sends messages the user did not directly ask for: training results from
//! the webhook server and balance top-ups made by an administrator.

use std::sync::Arc;
use teloxide::{Bot, prelude::Requester, types::{ChatId, Message, ParseMode}, payloads::SendMessageSetters};
use rust_decimal::Decimal;
use tracing::{debug, error, info};
use crate::i18n::{params, I18n};
use crate::models::{Avatar, AvatarStatus, User};
use crate::utils::errors::{AishaError, Result};
use crate::utils::helpers::format_coins;

#[derive(Clone)]
pub struct NotificationService {
    bot: Bot,
    i18n: Arc<I18n>,
}

impl NotificationService {
    pub fn new(bot: Bot, i18n: Arc<I18n>) -> Self {
        Self { bot, i18n }
    }

    /// Send an HTML message
    pub async fn send_text(&self, chat_id: ChatId, text: String) -> Result<Message> {
        match self.bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await {
            Ok(message) => {
                debug!(chat_id = ?chat_id, "Notification sent");
                Ok(message)
            }
            Err(e) => {
                error!(chat_id = ?chat_id, error = %e, "Failed to send notification");
                Err(AishaError::Telegram(e))
            }
        }
    }

    /// Text announcing a finished training, `None` for non-terminal avatars
    pub fn training_result_text(&self, avatar: &Avatar, lang: &str) -> Option<String> {
        let p = params([
            ("name", avatar.name.clone()),
            ("trigger_word", avatar.trigger_word.clone()),
            ("error", avatar.error_message.clone().unwrap_or_default()),
        ]);

        match avatar.status {
            AvatarStatus::Completed => Some(self.i18n.t("avatar.training_completed", lang, Some(&p))),
            AvatarStatus::Error => Some(self.i18n.t("avatar.training_failed", lang, Some(&p))),
            _ => None,
        }
    }

    /// Tell the owner how training ended
    pub async fn notify_training_finished(&self, user: &User, avatar: &Avatar) -> Result<()> {
        let Some(text) = self.training_result_text(avatar, &user.language_code) else {
            return Ok(());
        };

        self.send_text(ChatId(user.telegram_id), text).await?;
        info!(avatar_id = %avatar.id, telegram_id = user.telegram_id, status = %avatar.status, "Training result delivered");
        Ok(())
    }

    /// Tell a user their balance was topped up
    pub async fn notify_balance_credited(&self, user: &User, amount: Decimal, balance: Decimal) -> Result<()> {
        let p = params([
            ("amount", format_coins(amount)),
            ("balance", format_coins(balance)),
        ]);
        let text = self.i18n.t("balance.credited", &user.language_code, Some(&p));

        self.send_text(ChatId(user.telegram_id), text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use crate::config::I18nConfig;
    use crate::models::AvatarGender;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn i18n() -> Arc<I18n> {
        let mut i18n = I18n::new(&I18nConfig::default());
        i18n.load_language("ru", r#"{
            "avatar": {
                "training_completed": "Аватар {name} готов! Слово: {trigger_word}",
                "training_failed": "Не удалось обучить {name}: {error}"
            },
            "balance": {"credited": "+{amount}, баланс {balance}"}
        }"#).unwrap();
        Arc::new(i18n)
    }

    fn avatar(status: AvatarStatus) -> Avatar {
        Avatar {
            id: Uuid::new_v4(),
            user_id: 1,
            name: "Anna".to_string(),
            gender: AvatarGender::Female,
            status,
            trigger_word: "TOK_AB12CD".to_string(),
            training_steps: 1000,
            photos_count: 12,
            fal_request_id: Some("req-1".to_string()),
            diffusers_lora_file_url: None,
            config_file_url: None,
            error_message: Some("bad photos".to_string()),
            training_started_at: None,
            training_completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user() -> User {
        User {
            id: 1,
            telegram_id: 42,
            username: None,
            first_name: Some("Anna".to_string()),
            last_name: None,
            language_code: "ru".to_string(),
            is_premium: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_training_result_text() {
        let service = NotificationService::new(Bot::new("12345:test_token"), i18n());

        assert_eq!(
            service.training_result_text(&avatar(AvatarStatus::Completed), "ru").as_deref(),
            Some("Аватар Anna готов! Слово: TOK_AB12CD")
        );
        assert_eq!(
            service.training_result_text(&avatar(AvatarStatus::Error), "ru").as_deref(),
            Some("Не удалось обучить Anna: bad photos")
        );
        assert!(service.training_result_text(&avatar(AvatarStatus::Training), "ru").is_none());
    }

    #[tokio::test]
    async fn test_notify_training_finished_sends_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot[^/]+/sendmessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {
                    "message_id": 10,
                    "date": 1640995200,
                    "chat": {"id": 42, "type": "private", "first_name": "Anna"},
                    "text": "ok"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let bot = Bot::new("12345:test_token").set_api_url(url::Url::parse(&server.uri()).unwrap());
        let service = NotificationService::new(bot, i18n());

        service.notify_training_finished(&user(), &avatar(AvatarStatus::Completed)).await.unwrap();
    }
}
