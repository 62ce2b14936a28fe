//! Session storage backends
//!
//! Contexts are kept in Redis (`SET EX`) or in the `user_states` table,
//! selected by `session.backend`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use crate::config::{RedisConfig, Settings};
use crate::database::UserStateRepository;
use crate::utils::errors::{AishaError, Result};
use super::context::ConversationContext;

/// Per-user session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a non-expired context
    async fn load(&self, user_id: i64) -> Result<Option<ConversationContext>>;

    async fn save(&self, context: &ConversationContext) -> Result<()>;

    async fn delete(&self, user_id: i64) -> Result<()>;
}

/// Build the configured backend
pub async fn open_session_store(settings: &Settings, user_states: UserStateRepository) -> Result<Arc<dyn SessionStore>> {
    match settings.session.backend.as_str() {
        "redis" => {
            let store = RedisSessionStore::new(settings.redis.clone(), settings.session.ttl_seconds).await?;
            info!("Using Redis session store");
            Ok(Arc::new(store))
        }
        "postgres" => {
            info!("Using Postgres session store");
            Ok(Arc::new(PostgresSessionStore::new(user_states)))
        }
        other => Err(AishaError::Config(format!("Unknown session backend: {}", other))),
    }
}

/// Seconds until the context expires, at least one minute
fn ttl_seconds(context: &ConversationContext, default_ttl: u64) -> u64 {
    match context.expires_at {
        Some(expires_at) => (expires_at - chrono::Utc::now()).num_seconds().max(60) as u64,
        None => default_ttl,
    }
}

/// Redis backend
#[derive(Clone)]
pub struct RedisSessionStore {
    connection_manager: redis::aio::ConnectionManager,
    prefix: String,
    default_ttl: u64,
}

impl RedisSessionStore {
    pub async fn new(config: RedisConfig, default_ttl: u64) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        let store = Self {
            connection_manager,
            prefix: config.prefix,
            default_ttl,
        };
        store.ping().await?;
        Ok(store)
    }

    fn key(&self, user_id: i64) -> String {
        format!("{}session:{}", self.prefix, user_id)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, user_id: i64) -> Result<Option<ConversationContext>> {
        let mut conn = self.connection_manager.clone();
        let serialized: Option<String> = conn.get(self.key(user_id)).await?;

        let Some(data) = serialized else {
            return Ok(None);
        };

        let context: ConversationContext = match serde_json::from_str(&data) {
            Ok(context) => context,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Dropping unreadable session");
                self.delete(user_id).await?;
                return Ok(None);
            }
        };

        if context.is_expired() {
            self.delete(user_id).await?;
            return Ok(None);
        }
        Ok(Some(context))
    }

    async fn save(&self, context: &ConversationContext) -> Result<()> {
        let serialized = serde_json::to_string(context)?;
        let ttl = ttl_seconds(context, self.default_ttl);

        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(self.key(context.user_id), serialized, ttl).await?;
        debug!(user_id = context.user_id, scenario = ?context.scenario, step = ?context.step, ttl_seconds = ttl, "Session saved");
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: u32 = conn.del(self.key(user_id)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// `user_states` table backend
#[derive(Clone, Debug)]
pub struct PostgresSessionStore {
    repository: UserStateRepository,
}

impl PostgresSessionStore {
    pub fn new(repository: UserStateRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn load(&self, user_id: i64) -> Result<Option<ConversationContext>> {
        Ok(self.repository.get(user_id).await?.map(ConversationContext::from))
    }

    async fn save(&self, context: &ConversationContext) -> Result<()> {
        let data = serde_json::to_value(&context.data)?;
        self.repository
            .upsert(context.user_id, context.scenario.as_deref(), context.step.as_deref(), data, context.expires_at)
            .await?;
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> Result<()> {
        self.repository.delete(user_id).await
    }
}

/// Process-local backend for tests
#[derive(Clone, Default, Debug)]
pub struct MemorySessionStore {
    contexts: Arc<RwLock<HashMap<i64, ConversationContext>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, user_id: i64) -> Result<Option<ConversationContext>> {
        let contexts = self.contexts.read().await;
        Ok(contexts.get(&user_id).filter(|c| !c.is_expired()).cloned())
    }

    async fn save(&self, context: &ConversationContext) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        contexts.insert(context.user_id, context.clone());
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        contexts.remove(&user_id);
        Ok(())
    }
}
