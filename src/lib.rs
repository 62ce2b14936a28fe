//! Aisha Telegram Bot
//!
//! Backend of the Aisha bot: a coin balance ledger, AI avatar creation and
//! training through FAL AI, paid voice transcription through Whisper, object
//! storage on MinIO and the webhook server receiving training callbacks.

pub mod config;
pub mod database;
pub mod handlers;
pub mod i18n;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;
pub mod webhook;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{AishaError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use i18n::I18n;
pub use services::ServiceFactory;
pub use state::{AppContext, SessionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
