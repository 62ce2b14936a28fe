//! Test context for unified test setup
//!
//! Wires the real services over the test database, in-memory object storage,
//! scripted training and speech backends and a mock Telegram API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use aisha::config::Settings;
use aisha::database::DatabaseService;
use aisha::i18n::I18n;
use aisha::models::User;
use aisha::services::training::{TrainingApi, TrainingRequest};
use aisha::services::transcription::{AudioInput, SpeechResult, SpeechToText};
use aisha::services::{MemoryStorage, ServiceFactory};
use aisha::utils::errors::{AishaError, Result, TrainingError};

use super::database_helper::TestDatabase;
use super::telegram_mock::TelegramMockServer;
use super::test_data::{random_telegram_id, test_profile};

pub const TEST_WEBHOOK_URL: &str = "https://aisha.test/api/v1/avatar/status_update";

/// Training backend that records submissions
#[derive(Default)]
pub struct FakeTraining {
    pub submissions: Mutex<Vec<(TrainingRequest, String)>>,
    pub fail: AtomicBool,
    counter: AtomicUsize,
}

impl FakeTraining {
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn last_submission(&self) -> Option<(TrainingRequest, String)> {
        self.submissions.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl TrainingApi for FakeTraining {
    async fn submit_training(&self, request: &TrainingRequest, webhook_url: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AishaError::Training(TrainingError::ServiceUnavailable));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.submissions
            .lock()
            .expect("submissions lock")
            .push((request.clone(), webhook_url.to_string()));
        Ok(format!("fal-request-{}", n))
    }
}

/// Speech backend returning a fixed text
pub struct FakeSpeech {
    pub text: String,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl Default for FakeSpeech {
    fn default() -> Self {
        Self {
            text: "Привет, это тестовая запись.".to_string(),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, _audio: &AudioInput) -> Result<SpeechResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AishaError::Transcription("whisper returned 500".to_string()));
        }
        Ok(SpeechResult {
            text: self.text.clone(),
            language: Some("ru".to_string()),
        })
    }
}

/// Unified test context that manages all test components
pub struct TestContext {
    pub db: TestDatabase,
    pub database: DatabaseService,
    pub settings: Settings,
    pub storage: Arc<MemoryStorage>,
    pub training: Arc<FakeTraining>,
    pub speech: Arc<FakeSpeech>,
    pub telegram: TelegramMockServer,
    pub services: ServiceFactory,
}

impl TestContext {
    /// Full service stack, or `None` when no database is available
    pub async fn try_new() -> Option<Self> {
        let db = TestDatabase::try_new().await?;
        let settings = test_settings();

        let telegram = TelegramMockServer::new().await;
        telegram.mock_send_message().await;

        let mut i18n = I18n::new(&settings.i18n);
        i18n.load_translations(&settings.i18n.translations_dir).await.ok()?;

        let database = DatabaseService::new(db.pool.clone());
        let storage = Arc::new(MemoryStorage::new());
        let training = Arc::new(FakeTraining::default());
        let speech = Arc::new(FakeSpeech::default());

        let services = ServiceFactory::new(
            telegram.bot(),
            &settings,
            database.clone(),
            storage.clone(),
            training.clone(),
            speech.clone(),
            Arc::new(i18n),
        );

        Some(Self {
            db,
            database,
            settings,
            storage,
            training,
            speech,
            telegram,
            services,
        })
    }

    /// Register a fresh user
    pub async fn create_user(&self) -> User {
        self.services
            .user_service
            .register_or_get_user(&test_profile(random_telegram_id()))
            .await
            .expect("register user")
    }

    /// Register a user holding `coins`
    pub async fn create_funded_user(&self, coins: i64) -> User {
        let user = self.create_user().await;
        if coins > 0 {
            self.services
                .ledger_service
                .credit(user.id, Decimal::from(coins), "Test top-up")
                .await
                .expect("fund user");
        }
        user
    }

    pub async fn balance(&self, user_id: i64) -> Decimal {
        self.services
            .ledger_service
            .get_balance(user_id)
            .await
            .expect("balance")
    }
}

/// Small photo limits keep avatar tests short
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.bot.token = super::telegram_mock::TEST_BOT_TOKEN.to_string();
    settings.avatar.min_photos = 3;
    settings.avatar.max_photos = 5;
    settings.avatar.training_cost = Decimal::from(150);
    settings.transcription.cost_per_minute = Decimal::from(5);
    settings.session.backend = "postgres".to_string();
    settings
}
