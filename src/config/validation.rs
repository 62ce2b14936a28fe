//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use rust_decimal::Decimal;

use crate::utils::errors::{AishaError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_storage_config(&settings.storage)?;
    validate_avatar_config(&settings.avatar)?;
    validate_transcription_config(&settings.transcription)?;
    validate_session_config(&settings.session)?;
    validate_i18n_config(&settings.i18n)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(AishaError::Config(
            "Bot token is required".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(AishaError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(AishaError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(AishaError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(AishaError::Config(
            "Redis URL is required".to_string()
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    url::Url::parse(&config.endpoint)
        .map_err(|e| AishaError::Config(format!("Invalid storage endpoint: {}", e)))?;

    let buckets = [
        &config.avatars_bucket,
        &config.transcripts_bucket,
        &config.documents_bucket,
        &config.temp_bucket,
    ];
    if buckets.iter().any(|b| b.is_empty()) {
        return Err(AishaError::Config(
            "All storage bucket names must be set".to_string()
        ));
    }

    if config.presign_ttl_seconds == 0 {
        return Err(AishaError::Config(
            "Presigned URL TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_avatar_config(config: &super::AvatarConfig) -> Result<()> {
    if config.min_photos <= 0 {
        return Err(AishaError::Config(
            "Minimum photo count must be greater than 0".to_string()
        ));
    }

    if config.min_photos > config.max_photos {
        return Err(AishaError::Config(
            "Minimum photo count cannot exceed maximum photo count".to_string()
        ));
    }

    // the ledger records no zero-amount charges
    if config.training_cost <= Decimal::ZERO {
        return Err(AishaError::Config(
            "Training cost must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_transcription_config(config: &super::TranscriptionConfig) -> Result<()> {
    if config.cost_per_minute <= Decimal::ZERO {
        return Err(AishaError::Config(
            "Transcription cost per minute must be greater than 0".to_string()
        ));
    }

    if config.max_duration_seconds == 0 {
        return Err(AishaError::Config(
            "Maximum transcription duration must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_session_config(config: &super::SessionConfig) -> Result<()> {
    if !matches!(config.backend.as_str(), "redis" | "postgres") {
        return Err(AishaError::Config(
            format!("Unknown session backend: {}. Valid backends: redis, postgres", config.backend)
        ));
    }

    Ok(())
}

/// Validate internationalization configuration
fn validate_i18n_config(config: &super::I18nConfig) -> Result<()> {
    if config.default_language.is_empty() {
        return Err(AishaError::Config(
            "Default language is required".to_string()
        ));
    }

    if !config.supported_languages.contains(&config.default_language) {
        return Err(AishaError::Config(
            "Default language must be in supported languages list".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(AishaError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    if !matches!(config.format.as_str(), "pretty" | "json") {
        return Err(AishaError::Config(
            format!("Invalid log format: {}", config.format)
        ));
    }

    Ok(())
}
