//! Error handling for Aisha
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for the Aisha application
#[derive(Error, Debug)]
pub enum AishaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Telegram download error: {0}")]
    TelegramDownload(#[from] teloxide::DownloadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Training API error: {0}")]
    Training(#[from] TrainingError),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("Avatar not found: {avatar_id}")]
    AvatarNotFound { avatar_id: Uuid },

    #[error("Transcript not found: {transcript_id}")]
    TranscriptNotFound { transcript_id: Uuid },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Object storage specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("Storage request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid storage credentials: {0}")]
    Credentials(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// FAL AI training API specific errors
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Training request failed: {0}")]
    RequestFailed(String),

    #[error("Training API timeout")]
    Timeout,

    #[error("Invalid training response: {0}")]
    InvalidResponse(String),

    #[error("Training service unavailable")]
    ServiceUnavailable,
}

/// Result type alias for Aisha operations
pub type Result<T> = std::result::Result<T, AishaError>;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl AishaError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            AishaError::Database(_) => false,
            AishaError::Migration(_) => false,
            AishaError::Telegram(_) => true,
            AishaError::TelegramDownload(_) => true,
            AishaError::Storage(StorageError::NotFound { .. }) => false,
            AishaError::Storage(_) => true,
            AishaError::Training(TrainingError::InvalidResponse(_)) => false,
            AishaError::Training(_) => true,
            AishaError::Transcription(_) => true,
            AishaError::Config(_) => false,
            AishaError::PermissionDenied(_) => false,
            AishaError::InsufficientFunds { .. } => false,
            AishaError::UserNotFound { .. } => false,
            AishaError::AvatarNotFound { .. } => false,
            AishaError::TranscriptNotFound { .. } => false,
            AishaError::InvalidStateTransition { .. } => false,
            AishaError::Redis(_) => true,
            AishaError::Http(_) => true,
            AishaError::Serialization(_) => false,
            AishaError::Io(_) => true,
            AishaError::UrlParse(_) => false,
            AishaError::InvalidInput(_) => false,
            AishaError::ServiceUnavailable(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AishaError::Database(_) => ErrorSeverity::Critical,
            AishaError::Migration(_) => ErrorSeverity::Critical,
            AishaError::Config(_) => ErrorSeverity::Critical,
            AishaError::PermissionDenied(_) => ErrorSeverity::Warning,
            AishaError::InsufficientFunds { .. } => ErrorSeverity::Info,
            AishaError::InvalidInput(_) => ErrorSeverity::Info,
            AishaError::InvalidStateTransition { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Translation key of the message shown to the user for this error
    pub fn user_message_key(&self) -> &'static str {
        match self {
            AishaError::InsufficientFunds { .. } => "errors.insufficient_funds",
            AishaError::InvalidInput(_) => "errors.invalid_input",
            AishaError::PermissionDenied(_) => "errors.permission_denied",
            AishaError::AvatarNotFound { .. }
            | AishaError::TranscriptNotFound { .. }
            | AishaError::UserNotFound { .. } => "errors.not_found",
            AishaError::InvalidStateTransition { .. } => "errors.invalid_state",
            AishaError::Transcription(_) => "errors.transcription_failed",
            AishaError::Training(_) => "errors.training_failed",
            _ => "errors.generic",
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
