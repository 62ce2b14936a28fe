//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub storage: StorageConfig,
    pub openai: OpenAiConfig,
    pub fal: FalConfig,
    pub webhook: WebhookConfig,
    pub avatar: AvatarConfig,
    pub transcription: TranscriptionConfig,
    pub session: SessionConfig,
    pub i18n: I18nConfig,
    pub logging: LoggingConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    pub admin_ids: Vec<i64>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// MinIO / S3 object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub avatars_bucket: String,
    pub transcripts_bucket: String,
    pub documents_bucket: String,
    pub temp_bucket: String,
    pub presign_ttl_seconds: u32,
}

/// OpenAI (Whisper) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub whisper_model: String,
    pub timeout_seconds: u64,
}

/// FAL AI training API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FalConfig {
    pub api_key: String,
    pub queue_url: String,
    pub training_model: String,
    pub training_steps: i32,
    pub timeout_seconds: u64,
}

/// Inbound webhook server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub host: String,
    pub port: u16,
    /// Publicly reachable base URL FAL AI posts callbacks to
    pub public_url: String,
}

/// Avatar creation limits and pricing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub min_photos: i32,
    pub max_photos: i32,
    pub training_cost: Decimal,
    pub max_photo_size_bytes: u64,
}

/// Paid transcription pricing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub cost_per_minute: Decimal,
    pub max_duration_seconds: u32,
}

/// Per-user wizard session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `redis` or `postgres`
    pub backend: String,
    pub ttl_seconds: u64,
}

/// Internationalization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct I18nConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
    pub translations_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for the rolling log file; no file output when unset
    pub directory: Option<String>,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("AISHA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.admin_ids")
                    .with_list_parse_key("i18n.supported_languages")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::AishaError> {
        super::validation::validate_settings(self)
    }

    /// Check whether a Telegram user is a configured administrator
    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.bot.admin_ids.contains(&telegram_id)
    }

    /// Callback URL handed to FAL AI when a training is submitted
    pub fn training_webhook_url(&self) -> String {
        format!(
            "{}/api/v1/avatar/status_update",
            self.webhook.public_url.trim_end_matches('/')
        )
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            admin_ids: vec![],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/aisha".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: "aisha:".to_string(),
            ttl_seconds: 3600,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            avatars_bucket: "avatars".to_string(),
            transcripts_bucket: "transcripts".to_string(),
            documents_bucket: "documents".to_string(),
            temp_bucket: "temp".to_string(),
            presign_ttl_seconds: 3600,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            whisper_model: "whisper-1".to_string(),
            timeout_seconds: 120,
        }
    }
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            queue_url: "https://queue.fal.run".to_string(),
            training_model: "fal-ai/flux-lora-fast-training".to_string(),
            training_steps: 1000,
            timeout_seconds: 60,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: "http://localhost:8000".to_string(),
        }
    }
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            min_photos: 10,
            max_photos: 20,
            training_cost: Decimal::from(150),
            max_photo_size_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            cost_per_minute: Decimal::from(5),
            max_duration_seconds: 60 * 60,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            ttl_seconds: 60 * 60 * 24,
        }
    }
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_language: "ru".to_string(),
            supported_languages: vec!["ru".to_string(), "en".to_string()],
            translations_dir: "translations".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
        }
    }
}
