//! Test helpers module
//!
//! Database setup, a mock Telegram API, test data builders and a context
//! wiring the real services over test backends.

#![allow(dead_code)]

pub mod database_helper;
pub mod telegram_mock;
pub mod test_context;
pub mod test_data;

pub use database_helper::*;
pub use telegram_mock::*;
pub use test_context::*;
pub use test_data::*;
