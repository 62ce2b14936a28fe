//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Format a timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Split text into chunks of at most `max_chars` characters, preferring line breaks
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Format a coin amount without trailing zeros
pub fn format_coins(amount: Decimal) -> String {
    amount.normalize().to_string()
}

/// Format seconds as M:SS or H:MM:SS
pub fn format_duration(seconds: u32) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Number of started minutes in a clip, never less than one
pub fn started_minutes(duration_seconds: u32) -> u32 {
    duration_seconds.div_ceil(60).max(1)
}

/// Parse a positive coin amount typed by a user or an admin
pub fn parse_coin_amount(text: &str) -> Option<Decimal> {
    let normalized = text.trim().replace(',', ".");
    let amount = Decimal::from_str(&normalized).ok()?;
    if amount > Decimal::ZERO && amount.scale() <= 2 {
        Some(amount)
    } else {
        None
    }
}

/// Generate the trigger word a trained avatar answers to in prompts
pub fn generate_trigger_word() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("TOK_{}", suffix)
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Convert bytes to human readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 8), "hello...");
        assert_eq!(truncate_text("привет мир", 6), "при...");
    }

    #[test]
    fn test_split_message() {
        assert_eq!(split_message("short", 10), vec!["short"]);
        assert_eq!(split_message("aaaa\nbbbb\ncc", 10), vec!["aaaa\nbbbb\n", "cc"]);
        assert_eq!(split_message("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_format_coins() {
        assert_eq!(format_coins(Decimal::new(8500, 2)), "85");
        assert_eq!(format_coins(Decimal::new(1250, 2)), "12.5");
    }

    #[test]
    fn test_started_minutes() {
        assert_eq!(started_minutes(0), 1);
        assert_eq!(started_minutes(59), 1);
        assert_eq!(started_minutes(60), 1);
        assert_eq!(started_minutes(61), 2);
        assert_eq!(started_minutes(180), 3);
    }

    #[test]
    fn test_parse_coin_amount() {
        assert_eq!(parse_coin_amount("100"), Some(Decimal::from(100)));
        assert_eq!(parse_coin_amount(" 12,50 "), Some(Decimal::new(1250, 2)));
        assert_eq!(parse_coin_amount("0"), None);
        assert_eq!(parse_coin_amount("-5"), None);
        assert_eq!(parse_coin_amount("1.005"), None);
        assert_eq!(parse_coin_amount("abc"), None);
    }

    #[test]
    fn test_trigger_word_shape() {
        let word = generate_trigger_word();
        assert!(word.starts_with("TOK_"));
        assert_eq!(word.len(), 10);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(75), "1:15");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(500), "500 B");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my voice.ogg"), "my_voice.ogg");
    }
}
