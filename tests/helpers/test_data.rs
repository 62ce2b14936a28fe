//! Test data helpers for creating test objects

use aisha::services::{AudioInput, PhotoUpload, TelegramProfile};
use fake::faker::internet::en::Username;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

/// Telegram profile with random names
pub fn test_profile(telegram_id: i64) -> TelegramProfile {
    TelegramProfile {
        telegram_id,
        username: Some(Username().fake()),
        first_name: Some(FirstName().fake()),
        last_name: Some(LastName().fake()),
        language_code: Some("ru".to_string()),
        is_premium: false,
    }
}

/// Random Telegram id in the range real user ids use
pub fn random_telegram_id() -> i64 {
    (100_000_000..999_999_999).fake::<i64>()
}

/// A small distinct "JPEG" for upload `n`
pub fn test_photo(n: usize) -> PhotoUpload {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend((0..256).map(|i| ((i + n) % 251) as u8));

    PhotoUpload {
        telegram_file_unique_id: format!("AQAD{:04}", n),
        data,
        width: Some(1024),
        height: Some(1280),
        content_type: "image/jpeg".to_string(),
    }
}

/// Voice note of the given length
pub fn test_audio(duration_seconds: u32) -> AudioInput {
    AudioInput {
        data: b"OggS\x00\x02fake-opus-payload".to_vec(),
        file_name: "voice.ogg".to_string(),
        mime_type: "audio/ogg".to_string(),
        duration_seconds,
    }
}
