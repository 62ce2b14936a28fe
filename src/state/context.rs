//! Conversation context management
//!
//! Per-user wizard state: which scenario a user is in, the current step and
//! the data collected so far. Contexts expire after the configured TTL.

use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};

use crate::config::Settings;
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::models::state::UserState;
use crate::services::{
    AvatarService, LedgerService, NotificationService, ServiceFactory, TranscriptionService, UserService,
};
use crate::state::storage::SessionStore;
use crate::utils::errors::{AishaError, Result};

/// Scenario and step names of the bot wizards
pub mod scenarios {
    pub const AVATAR_CREATION: &str = "avatar_creation";

    pub const STEP_NAME: &str = "name";
    pub const STEP_GENDER: &str = "gender";
    pub const STEP_PHOTOS: &str = "photos";

    pub const KEY_NAME: &str = "name";
    pub const KEY_AVATAR_ID: &str = "avatar_id";
    /// Position in the avatar gallery; kept outside any scenario
    pub const KEY_GALLERY_INDEX: &str = "gallery_index";
}

/// Everything a handler needs
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub database: DatabaseService,
    pub users: UserService,
    pub ledger: LedgerService,
    pub avatars: AvatarService,
    pub transcription: TranscriptionService,
    pub notifications: NotificationService,
    pub sessions: Arc<dyn SessionStore>,
    pub i18n: Arc<I18n>,
}

impl AppContext {
    pub fn from_factory(
        factory: ServiceFactory,
        database: DatabaseService,
        sessions: Arc<dyn SessionStore>,
        settings: Settings,
    ) -> Self {
        Self {
            i18n: factory.i18n.clone(),
            users: factory.user_service,
            ledger: factory.ledger_service,
            avatars: factory.avatar_service,
            transcription: factory.transcription_service,
            notifications: factory.notification_service,
            sessions,
            settings,
            database,
        }
    }

    /// Session TTL from configuration
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.settings.session.ttl_seconds).unwrap_or(i64::MAX / 1000))
    }

    /// Load a user's context or start an empty one
    pub async fn load_session(&self, user_id: i64) -> Result<ConversationContext> {
        Ok(self.sessions.load(user_id).await?.unwrap_or_else(|| ConversationContext::new(user_id)))
    }
}

/// User conversation context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Telegram user this context belongs to
    pub user_id: i64,
    pub scenario: Option<String>,
    pub step: Option<String>,
    pub data: HashMap<String, serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            scenario: None,
            step: None,
            data: HashMap::new(),
            expires_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Start a scenario, dropping data from any previous one
    pub fn start_scenario(&mut self, scenario: &str, initial_step: &str, ttl: Duration) {
        self.scenario = Some(scenario.to_string());
        self.step = Some(initial_step.to_string());
        self.data.clear();
        self.updated_at = Utc::now();
        self.expires_at = Some(Utc::now() + ttl);
    }

    /// Move to another step of the current scenario
    pub fn next_step(&mut self, step: &str) -> Result<()> {
        if self.scenario.is_none() {
            return Err(AishaError::InvalidStateTransition {
                from: "no_scenario".to_string(),
                to: step.to_string(),
            });
        }

        self.step = Some(step.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Leave the current scenario and clear its data
    pub fn complete_scenario(&mut self) {
        self.scenario = None;
        self.step = None;
        self.data.clear();
        self.updated_at = Utc::now();
    }

    pub fn set_data<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), json_value);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn get_data<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_data::<String>(key).unwrap_or(None)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_data::<i64>(key).unwrap_or(None)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() > expires_at)
    }

    /// Push the expiry `ttl` into the future
    pub fn touch(&mut self, ttl: Duration) {
        self.updated_at = Utc::now();
        self.expires_at = Some(self.updated_at + ttl);
    }

    pub fn is_in_scenario(&self, scenario: &str) -> bool {
        self.scenario.as_deref() == Some(scenario)
    }

    pub fn is_at(&self, scenario: &str, step: &str) -> bool {
        self.is_in_scenario(scenario) && self.step.as_deref() == Some(step)
    }

    /// Nothing worth persisting
    pub fn is_empty(&self) -> bool {
        self.scenario.is_none() && self.data.is_empty()
    }
}

impl From<UserState> for ConversationContext {
    fn from(state: UserState) -> Self {
        let data = match state.data {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };

        Self {
            user_id: state.telegram_id,
            scenario: state.scenario,
            step: state.step,
            data,
            expires_at: state.expires_at,
            updated_at: state.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::scenarios::*;

    #[test]
    fn test_new_context() {
        let context = ConversationContext::new(123);
        assert_eq!(context.user_id, 123);
        assert!(context.is_empty());
        assert!(!context.is_expired());
    }

    #[test]
    fn test_avatar_wizard_flow() {
        let mut context = ConversationContext::new(123);
        context.set_data(KEY_GALLERY_INDEX, 4).unwrap();
        context.start_scenario(AVATAR_CREATION, STEP_NAME, Duration::hours(1));

        assert!(context.is_at(AVATAR_CREATION, STEP_NAME));
        assert_eq!(context.get_i64(KEY_GALLERY_INDEX), None);

        context.set_data(KEY_NAME, "Anna").unwrap();
        context.next_step(STEP_GENDER).unwrap();
        assert!(context.is_at(AVATAR_CREATION, STEP_GENDER));
        assert_eq!(context.get_string(KEY_NAME), Some("Anna".to_string()));

        context.complete_scenario();
        assert!(context.is_empty());
    }

    #[test]
    fn test_next_step_requires_scenario() {
        let mut context = ConversationContext::new(1);
        assert!(context.next_step(STEP_PHOTOS).is_err());
    }

    #[test]
    fn test_expiry() {
        let mut context = ConversationContext::new(1);
        context.start_scenario(AVATAR_CREATION, STEP_NAME, Duration::seconds(-5));
        assert!(context.is_expired());

        context.touch(Duration::hours(1));
        assert!(!context.is_expired());
    }

    #[test]
    fn test_from_user_state() {
        let state = UserState {
            telegram_id: 77,
            scenario: Some(AVATAR_CREATION.to_string()),
            step: Some(STEP_PHOTOS.to_string()),
            data: serde_json::json!({"name": "Anna"}),
            expires_at: None,
            updated_at: Utc::now(),
        };
        let context = ConversationContext::from(state);
        assert!(context.is_at(AVATAR_CREATION, STEP_PHOTOS));
        assert_eq!(context.get_string(KEY_NAME), Some("Anna".to_string()));
    }
}
