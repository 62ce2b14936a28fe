//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the Aisha binaries.

use rust_decimal::Decimal;
use tracing::{info, warn, error, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;
use crate::config::LoggingConfig;
use crate::utils::errors::{AishaError, Result};

/// Initialize logging based on configuration
///
/// The returned guard flushes the file writer on drop and must be kept
/// alive for as long as the process logs.
pub fn init_logging(config: &LoggingConfig, file_name: &str) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let json = config.format == "json";

    let stdout_layer = if json {
        fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = if json {
                fmt::layer().json().with_ansi(false).with_writer(non_blocking).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(non_blocking).boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AishaError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!(level = %config.level, format = %config.format, "Logging initialized");
    Ok(guard)
}

/// Log user actions with structured data
pub fn log_user_action(telegram_id: i64, action: &str, details: Option<&str>) {
    info!(
        telegram_id = telegram_id,
        action = action,
        details = details,
        "User action performed"
    );
}

/// Log a committed balance mutation
pub fn log_balance_change(user_id: i64, delta: Decimal, new_balance: Decimal, description: &str) {
    info!(
        user_id = user_id,
        delta = %delta,
        new_balance = %new_balance,
        description = description,
        "Balance adjusted"
    );
}

/// Log avatar status transitions
pub fn log_avatar_transition(avatar_id: Uuid, from: &str, to: &str) {
    info!(
        avatar_id = %avatar_id,
        from = from,
        to = to,
        "Avatar status changed"
    );
}

/// Log inbound webhook outcomes
pub fn log_webhook_event(request_id: &str, status: &str, applied: bool) {
    if applied {
        info!(request_id = request_id, status = status, "Training webhook applied");
    } else {
        warn!(request_id = request_id, status = status, "Training webhook discarded");
    }
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}

/// Log storage operations
pub fn log_storage_operation(operation: &str, bucket: &str, key: &str, success: bool) {
    if success {
        debug!(operation = operation, bucket = bucket, key = key, "Storage operation completed");
    } else {
        error!(operation = operation, bucket = bucket, key = key, "Storage operation failed");
    }
}
