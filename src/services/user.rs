//! User service implementation
//!
//! Users are created on first contact and their Telegram profile fields are
//! kept in sync on later contacts.

use tracing::{debug, info};
use crate::config::settings::Settings;
use crate::database::repositories::UserRepository;
use crate::models::user::{User, CreateUserRequest, UpdateUserRequest};
use crate::utils::errors::{AishaError, Result};

/// Profile data carried by every Telegram update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelegramProfile {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: bool,
}

impl From<&teloxide::types::User> for TelegramProfile {
    fn from(user: &teloxide::types::User) -> Self {
        Self {
            telegram_id: user.id.0 as i64,
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
            language_code: user.language_code.clone(),
            is_premium: user.is_premium,
        }
    }
}

/// Fields of `user` that differ from `profile`; language is chosen by the bot and never synced
pub fn profile_changes(user: &User, profile: &TelegramProfile) -> Option<UpdateUserRequest> {
    let mut update = UpdateUserRequest::default();
    let mut changed = false;

    if user.username != profile.username {
        update.username = profile.username.clone();
        changed = true;
    }
    if profile.first_name.is_some() && user.first_name != profile.first_name {
        update.first_name = profile.first_name.clone();
        changed = true;
    }
    if user.last_name != profile.last_name {
        update.last_name = profile.last_name.clone();
        changed = true;
    }
    if user.is_premium != profile.is_premium {
        update.is_premium = Some(profile.is_premium);
        changed = true;
    }

    changed.then_some(update)
}

#[derive(Clone)]
pub struct UserService {
    user_repository: UserRepository,
    settings: Settings,
}

impl UserService {
    pub fn new(user_repository: UserRepository, settings: Settings) -> Self {
        Self {
            user_repository,
            settings,
        }
    }

    /// Register a new user or return the existing one with synced profile fields
    pub async fn register_or_get_user(&self, profile: &TelegramProfile) -> Result<User> {
        if let Some(existing_user) = self.user_repository.find_by_telegram_id(profile.telegram_id).await? {
            return match profile_changes(&existing_user, profile) {
                Some(update) => {
                    debug!(user_id = existing_user.id, "Syncing Telegram profile");
                    self.user_repository.update(existing_user.id, update).await
                }
                None => Ok(existing_user),
            };
        }

        let language = profile
            .language_code
            .as_deref()
            .and_then(|lang| lang.split('-').next())
            .filter(|lang| self.settings.i18n.supported_languages.iter().any(|l| l == lang))
            .unwrap_or(self.settings.i18n.default_language.as_str())
            .to_string();

        let user = self.user_repository.create(CreateUserRequest {
            telegram_id: profile.telegram_id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            language_code: Some(language),
            is_premium: profile.is_premium,
        }).await?;

        info!(user_id = user.id, telegram_id = profile.telegram_id, "New user registered");
        Ok(user)
    }

    pub async fn get_user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        self.user_repository.find_by_telegram_id(telegram_id).await
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        self.user_repository.find_by_id(user_id).await
    }

    /// User by Telegram id, or `UserNotFound`
    pub async fn require_by_telegram_id(&self, telegram_id: i64) -> Result<User> {
        self.user_repository.find_by_telegram_id(telegram_id).await?
            .ok_or(AishaError::UserNotFound { user_id: telegram_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored_user() -> User {
        User {
            id: 1,
            telegram_id: 42,
            username: Some("anna".to_string()),
            first_name: Some("Anna".to_string()),
            last_name: None,
            language_code: "ru".to_string(),
            is_premium: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn profile() -> TelegramProfile {
        TelegramProfile {
            telegram_id: 42,
            username: Some("anna".to_string()),
            first_name: Some("Anna".to_string()),
            last_name: None,
            language_code: Some("en".to_string()),
            is_premium: false,
        }
    }

    #[test]
    fn test_unchanged_profile_needs_no_update() {
        assert!(profile_changes(&stored_user(), &profile()).is_none());
    }

    #[test]
    fn test_changed_fields_are_synced() {
        let mut changed = profile();
        changed.username = Some("anna_k".to_string());
        changed.is_premium = true;

        let update = profile_changes(&stored_user(), &changed).unwrap();
        assert_eq!(update.username.as_deref(), Some("anna_k"));
        assert_eq!(update.is_premium, Some(true));
        assert!(update.language_code.is_none());
        assert!(update.first_name.is_none());
    }
}
