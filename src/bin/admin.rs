//! Aisha maintenance CLI
//!
//! One-shot administrative tasks: balance top-ups, ledger audits, listing
//! avatars stuck in training and pruning expired sessions.

use std::sync::Arc;
use anyhow::bail;
use clap::{Parser, Subcommand};
use teloxide::Bot;

use aisha::{
    config::Settings,
    database::{create_pool, DatabaseService},
    i18n::I18n,
    services::ServiceFactory,
    utils::helpers::{format_coins, format_timestamp, parse_coin_amount},
    utils::logging,
};

#[derive(Parser)]
#[command(name = "aisha-admin")]
#[command(author, version, about = "Maintenance tasks for the Aisha bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Credit coins to a user
    Topup {
        #[arg(long)]
        telegram_id: i64,

        /// Amount in coins, e.g. 100 or 12.50
        #[arg(long)]
        amount: String,

        #[arg(long, default_value = "Manual top-up")]
        description: String,
    },

    /// Show a user's balance and recent transactions
    Balance {
        #[arg(long)]
        telegram_id: i64,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Check that balances equal the sum of their transactions
    Audit {
        /// Audit a single user instead of everyone
        #[arg(long)]
        telegram_id: Option<i64>,
    },

    /// List avatars that have been training for too long
    StuckAvatars {
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },

    /// Delete expired wizard sessions from `user_states`
    CleanupSessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new()?;
    let _log_guard = logging::init_logging(&settings.logging, "aisha-admin.log")?;

    let pool = create_pool(&settings.database).await?;
    let database = DatabaseService::new(pool);

    let i18n = Arc::new(I18n::new(&settings.i18n));
    let services = ServiceFactory::from_settings(Bot::new(&settings.bot.token), &settings, database.clone(), i18n)?;

    match cli.command {
        Commands::Topup { telegram_id, amount, description } => {
            let Some(amount) = parse_coin_amount(&amount) else {
                bail!("amount must be a positive number with at most two decimals");
            };
            let user = services.user_service.require_by_telegram_id(telegram_id).await?;
            let balance = services.ledger_service.credit(user.id, amount, &description).await?;
            println!(
                "Credited {} coins to {} ({}). New balance: {}",
                format_coins(amount),
                user.display_name(),
                telegram_id,
                format_coins(balance)
            );
        }
        Commands::Balance { telegram_id, limit } => {
            let user = services.user_service.require_by_telegram_id(telegram_id).await?;
            let balance = services.ledger_service.get_balance(user.id).await?;
            println!("{} ({}): {} coins", user.display_name(), telegram_id, format_coins(balance));

            for transaction in services.ledger_service.history(user.id, limit).await? {
                println!(
                    "  {}  {:>10}  {}",
                    format_timestamp(transaction.created_at),
                    transaction.amount.normalize(),
                    transaction.description
                );
            }
        }
        Commands::Audit { telegram_id } => {
            let audits = match telegram_id {
                Some(telegram_id) => {
                    let user = services.user_service.require_by_telegram_id(telegram_id).await?;
                    vec![services.ledger_service.audit(user.id).await?]
                }
                None => services.ledger_service.audit_all().await?,
            };

            let mut inconsistent = 0;
            for audit in &audits {
                if !audit.consistent {
                    inconsistent += 1;
                    println!(
                        "user {}: balance {} != transactions {} (diff {})",
                        audit.user_id,
                        audit.balance,
                        audit.transactions_sum,
                        audit.balance - audit.transactions_sum
                    );
                }
            }
            println!("Audited {} balances, {} inconsistent", audits.len(), inconsistent);

            if inconsistent > 0 {
                bail!("ledger invariant violated for {} users", inconsistent);
            }
        }
        Commands::StuckAvatars { older_than_hours } => {
            if older_than_hours <= 0 {
                bail!("--older-than-hours must be positive");
            }
            let avatars = services
                .avatar_service
                .stuck_in_training(chrono::Duration::hours(older_than_hours))
                .await?;

            for avatar in &avatars {
                println!(
                    "{}  user {}  {}  request {}  started {}",
                    avatar.id,
                    avatar.user_id,
                    avatar.name,
                    avatar.fal_request_id.as_deref().unwrap_or("-"),
                    avatar.training_started_at.map(format_timestamp).unwrap_or_else(|| "-".to_string())
                );
            }
            println!("{} avatars in training for more than {}h", avatars.len(), older_than_hours);
        }
        Commands::CleanupSessions => {
            let removed = database.cleanup_expired_sessions().await?;
            println!("Removed {} expired sessions", removed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rust_decimal::Decimal;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_topup() {
        let cli = Cli::try_parse_from(["aisha-admin", "topup", "--telegram-id", "42", "--amount", "100"]).unwrap();
        match cli.command {
            Commands::Topup { telegram_id, amount, description } => {
                assert_eq!(telegram_id, 42);
                assert_eq!(parse_coin_amount(&amount), Some(Decimal::from(100)));
                assert_eq!(description, "Manual top-up");
            }
            _ => panic!("expected topup"),
        }
    }

    #[test]
    fn test_parse_stuck_avatars_default() {
        let cli = Cli::try_parse_from(["aisha-admin", "stuck-avatars"]).unwrap();
        assert!(matches!(cli.command, Commands::StuckAvatars { older_than_hours: 24 }));
    }

    #[test]
    fn test_parse_cleanup_sessions() {
        let cli = Cli::try_parse_from(["aisha-admin", "cleanup-sessions"]).unwrap();
        assert!(matches!(cli.command, Commands::CleanupSessions));
    }
}
