//! Aisha webhook server
//!
//! Receives FAL AI training callbacks and notifies avatar owners.

use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use teloxide::Bot;
use tracing::info;

use aisha::{
    config::Settings,
    database::{create_pool, run_migrations, DatabaseService},
    i18n::I18n,
    services::ServiceFactory,
    utils::logging,
    webhook::{self, WebhookState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::new()?;
    settings.validate()?;
    let _log_guard = logging::init_logging(&settings.logging, "aisha-webhook.log")?;

    info!("Starting {} webhook server...", aisha::info());

    let pool = create_pool(&settings.database).await?;
    run_migrations(&pool).await?;
    let database = DatabaseService::new(pool);

    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations(&settings.i18n.translations_dir).await?;

    let bot = Bot::new(&settings.bot.token);
    let factory = ServiceFactory::from_settings(bot, &settings, database.clone(), Arc::new(i18n))?;

    let state = WebhookState {
        database,
        avatars: factory.avatar_service,
        users: factory.user_service,
        notifications: factory.notification_service,
    };

    let addr: SocketAddr = format!("{}:{}", settings.webhook.host, settings.webhook.port)
        .parse()
        .with_context(|| format!("invalid webhook bind address {}:{}", settings.webhook.host, settings.webhook.port))?;

    info!(public_url = %settings.training_webhook_url(), "Training callbacks are expected here");
    webhook::serve(addr, state).await?;
    Ok(())
}
