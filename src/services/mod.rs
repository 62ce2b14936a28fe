//! Services module
//!
//! This module contains business logic services

pub mod avatar;
pub mod balance;
pub mod notification;
pub mod storage;
pub mod training;
pub mod transcription;
pub mod user;

// Re-export commonly used services
pub use avatar::{AvatarService, PhotoUpload, WebhookOutcome};
pub use balance::LedgerService;
pub use notification::NotificationService;
pub use storage::{Bucket, MemoryStorage, ObjectStorage, S3Storage, StoragePaths};
pub use training::{FalClient, TrainingApi, TrainingWebhook};
pub use transcription::{AudioInput, SpeechToText, TranscriptionService, WhisperClient};
pub use user::{TelegramProfile, UserService};

use std::sync::Arc;
use teloxide::Bot;
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub user_service: UserService,
    pub ledger_service: LedgerService,
    pub avatar_service: AvatarService,
    pub transcription_service: TranscriptionService,
    pub notification_service: NotificationService,
    pub i18n: Arc<I18n>,
}

impl ServiceFactory {
    /// Wire services over explicit backends
    pub fn new(
        bot: Bot,
        settings: &Settings,
        database: DatabaseService,
        storage: Arc<dyn ObjectStorage>,
        training: Arc<dyn TrainingApi>,
        speech: Arc<dyn SpeechToText>,
        i18n: Arc<I18n>,
    ) -> Self {
        let user_service = UserService::new(database.users.clone(), settings.clone());
        let ledger_service = LedgerService::new(database.clone());
        let avatar_service = AvatarService::new(
            database.clone(),
            ledger_service.clone(),
            storage.clone(),
            training,
            settings,
        );
        let transcription_service = TranscriptionService::new(
            database,
            ledger_service.clone(),
            storage,
            speech,
            settings,
        );
        let notification_service = NotificationService::new(bot, i18n.clone());

        Self {
            user_service,
            ledger_service,
            avatar_service,
            transcription_service,
            notification_service,
            i18n,
        }
    }

    /// Wire services over MinIO, FAL AI and Whisper from configuration
    pub fn from_settings(bot: Bot, settings: &Settings, database: DatabaseService, i18n: Arc<I18n>) -> Result<Self> {
        let storage: Arc<dyn ObjectStorage> = Arc::new(S3Storage::new(&settings.storage)?);
        let training: Arc<dyn TrainingApi> = Arc::new(FalClient::new(settings.fal.clone())?);
        let speech: Arc<dyn SpeechToText> = Arc::new(WhisperClient::new(settings.openai.clone())?);

        Ok(Self::new(bot, settings, database, storage, training, speech, i18n))
    }
}
