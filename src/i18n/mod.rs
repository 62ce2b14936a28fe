//! Internationalization module
//!
//! Bot texts live in `translations/{lang}.json` as nested objects addressed
//! with dotted keys (`avatar.photo_added`). Russian is the default language.

pub mod loader;

// Re-export commonly used i18n components
pub use loader::{I18n, TranslationParams, params};
