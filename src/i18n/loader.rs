//! Translation loader

use std::collections::HashMap;
use std::path::Path;
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info, warn};
use crate::config::I18nConfig;
use crate::utils::errors::{AishaError, Result};

/// Loaded translations
#[derive(Debug, Clone)]
pub struct I18n {
    translations: HashMap<String, Map<String, Value>>,
    default_language: String,
    supported_languages: Vec<String>,
}

/// Placeholder values, substituted for `{name}` in a template
pub type TranslationParams = HashMap<String, String>;

/// Build parameters from `(name, value)` pairs
pub fn params<const N: usize>(pairs: [(&str, String); N]) -> TranslationParams {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

impl I18n {
    pub fn new(config: &I18nConfig) -> Self {
        Self {
            translations: HashMap::new(),
            default_language: config.default_language.clone(),
            supported_languages: config.supported_languages.clone(),
        }
    }

    /// Load every supported language from `dir`; the default language is mandatory
    pub async fn load_translations(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();

        for lang_code in self.supported_languages.clone() {
            let file_path = dir.join(format!("{}.json", lang_code));
            let loaded = match fs::read_to_string(&file_path).await {
                Ok(content) => self.load_language(&lang_code, &content),
                Err(e) => Err(AishaError::Io(e)),
            };

            match loaded {
                Ok(keys) => info!(language = %lang_code, keys = keys, "Loaded translations"),
                Err(e) if lang_code == self.default_language => {
                    return Err(AishaError::Config(format!(
                        "Failed to load default language translations from {}: {}",
                        file_path.display(),
                        e
                    )));
                }
                Err(e) => warn!(language = %lang_code, error = %e, "Skipping translations"),
            }
        }

        Ok(())
    }

    /// Load one language from JSON text; returns the number of leaf keys
    pub fn load_language(&mut self, lang_code: &str, content: &str) -> Result<usize> {
        match serde_json::from_str::<Value>(content)? {
            Value::Object(map) => {
                let keys = count_keys(&map);
                self.translations.insert(lang_code.to_string(), map);
                debug!(language = lang_code, keys = keys, "Parsed translation file");
                Ok(keys)
            }
            _ => Err(AishaError::Config(format!("Invalid translation file format for {}", lang_code))),
        }
    }

    /// Translate `key`, falling back to the default language and then to the key itself
    pub fn t(&self, key: &str, lang: &str, params: Option<&TranslationParams>) -> String {
        let effective_lang = self.effective_language(lang);

        let template = self
            .lookup(key, effective_lang)
            .or_else(|| self.lookup(key, &self.default_language));

        match template {
            Some(text) => format_message(&text, params),
            None => {
                warn!(key = key, "Translation key not found");
                key.to_string()
            }
        }
    }

    /// Translate a plural form (`key.one`, `key.few`, `key.many`, `key.other`)
    pub fn tp(&self, key: &str, lang: &str, count: i64, params: Option<&TranslationParams>) -> String {
        let effective_lang = self.effective_language(lang);
        let plural_key = format!("{}.{}", key, plural_form(count, effective_lang));

        let mut final_params = params.cloned().unwrap_or_default();
        final_params.insert("count".to_string(), count.to_string());

        self.t(&plural_key, effective_lang, Some(&final_params))
    }

    pub fn is_language_supported(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Map a Telegram locale such as `en-US` to a supported language
    pub fn detect_user_language(&self, telegram_lang: Option<&str>) -> String {
        telegram_lang
            .and_then(|lang| lang.split('-').next())
            .filter(|code| self.is_language_supported(code))
            .map(str::to_string)
            .unwrap_or_else(|| self.default_language.clone())
    }

    fn effective_language<'a>(&'a self, lang: &'a str) -> &'a str {
        if self.is_language_supported(lang) && self.translations.contains_key(lang) {
            lang
        } else {
            &self.default_language
        }
    }

    fn lookup(&self, key: &str, lang: &str) -> Option<String> {
        let mut current = self.translations.get(lang)?.get(key.split('.').next()?)?;
        for part in key.split('.').skip(1) {
            current = current.get(part)?;
        }

        match current {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("other").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }
}

fn format_message(template: &str, params: Option<&TranslationParams>) -> String {
    let mut result = template.to_string();
    if let Some(params) = params {
        for (key, value) in params {
            result = result.replace(&format!("{{{}}}", key), value);
        }
    }
    result
}

/// CLDR plural category for the two bot languages
fn plural_form(count: i64, lang: &str) -> &'static str {
    match lang {
        "ru" => {
            let abs_count = count.abs();
            let last_digit = abs_count % 10;
            let last_two_digits = abs_count % 100;

            if last_digit == 1 && last_two_digits != 11 {
                "one"
            } else if (2..=4).contains(&last_digit) && !(12..=14).contains(&last_two_digits) {
                "few"
            } else {
                "many"
            }
        }
        _ => {
            if count == 1 { "one" } else { "other" }
        }
    }
}

fn count_keys(obj: &Map<String, Value>) -> usize {
    obj.values()
        .map(|value| match value {
            Value::Object(nested) => count_keys(nested),
            _ => 1,
        })
        .sum()
}
