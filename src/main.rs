//! Aisha Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;
use teloxide::{prelude::*, types::Update};
use teloxide::dispatching::UpdateHandler;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use aisha::{
    config::Settings,
    database::{create_pool, run_migrations, DatabaseService},
    handlers::{handle_callback_query, handle_command, handle_message, language_for, reply_error, Command},
    i18n::I18n,
    services::ServiceFactory,
    state::{open_session_store, AppContext},
    utils::logging,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = logging::init_logging(&settings.logging, "aisha-bot.log")?;

    info!("Starting {}...", aisha::info());

    info!("Connecting to database...");
    let pool = create_pool(&settings.database).await?;
    run_migrations(&pool).await?;
    let database = DatabaseService::new(pool);

    info!("Loading translations...");
    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations(&settings.i18n.translations_dir).await?;
    let i18n = Arc::new(i18n);

    let sessions = open_session_store(&settings, database.user_states.clone()).await?;

    let bot = Bot::new(&settings.bot.token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    info!("Initializing services...");
    let factory = ServiceFactory::from_settings(bot.clone(), &settings, database.clone(), i18n)?;
    let ctx = Arc::new(AppContext::from_factory(factory, database, sessions, settings));

    let mut dispatcher = Dispatcher::builder(bot, create_handler())
        .dependencies(dptree::deps![ctx])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.kind);
        })
        .enable_ctrlc_handler()
        .build();

    info!("Aisha bot is ready, starting long polling");
    dispatcher.dispatch().await;

    info!("Aisha bot has been shut down.");
    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(on_command),
                )
                .branch(dptree::endpoint(on_message)),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

async fn on_command(bot: Bot, msg: Message, cmd: Command, ctx: Arc<AppContext>) -> HandlerResult {
    if let Err(e) = handle_command(bot.clone(), msg.clone(), cmd, ctx.clone()).await {
        let lang = language_for(&ctx, msg.from.as_ref()).await;
        reply_error(&bot, &ctx, msg.chat.id, &lang, &e).await;
    }
    Ok(())
}

async fn on_message(bot: Bot, msg: Message, ctx: Arc<AppContext>) -> HandlerResult {
    if let Err(e) = handle_message(bot.clone(), msg.clone(), ctx.clone()).await {
        let lang = language_for(&ctx, msg.from.as_ref()).await;
        reply_error(&bot, &ctx, msg.chat.id, &lang, &e).await;
    }
    Ok(())
}

async fn on_callback(bot: Bot, query: CallbackQuery, ctx: Arc<AppContext>) -> HandlerResult {
    let chat_id = query.message.as_ref().map(|m| m.chat().id);
    let from = query.from.clone();

    if let Err(e) = handle_callback_query(bot.clone(), query, ctx.clone()).await {
        let lang = language_for(&ctx, Some(&from)).await;
        let chat_id = chat_id.unwrap_or(ChatId(from.id.0 as i64));
        reply_error(&bot, &ctx, chat_id, &lang, &e).await;
    }
    Ok(())
}
