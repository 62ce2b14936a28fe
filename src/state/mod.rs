//! State management module
//!
//! This module handles conversation state and user context

pub mod context;
pub mod storage;

// Re-export commonly used state components
pub use context::{AppContext, ConversationContext, scenarios};
pub use storage::{open_session_store, MemorySessionStore, PostgresSessionStore, RedisSessionStore, SessionStore};
