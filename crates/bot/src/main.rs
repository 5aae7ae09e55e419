use std::sync::Arc;

use shared::config::BotConfig;
use shared::telegram::TelegramGateway;
use shared::{ReminderBot, SessionStore};
use tracing::{error, info, warn};

mod polling;
mod retry;
mod types;

pub(crate) use retry::retry_delay_seconds;
pub(crate) use types::PollBatchMetrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "reminder_bot=debug,shared=debug".to_string()),
        )
        .init();

    let config = match BotConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read bot config: {err}");
            std::process::exit(1);
        }
    };

    let telegram = match TelegramGateway::new(&config) {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            error!("failed to build telegram gateway: {err}");
            std::process::exit(1);
        }
    };

    let mut offset = None;
    if config.skip_pending_updates {
        match telegram.skip_pending_updates().await {
            Ok(next_offset) => offset = next_offset,
            Err(err) => warn!("failed to skip pending updates: {err}"),
        }
    }

    let bot = ReminderBot::new(SessionStore::new(), telegram.clone());

    info!(
        poll_timeout_seconds = config.poll_timeout_seconds,
        skip_pending_updates = config.skip_pending_updates,
        "reminder bot starting"
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        _ = polling::run_polling(&bot, &telegram, &config, offset) => {}
    }

    let live_sessions = bot.store().len();
    if live_sessions > 0 {
        warn!(live_sessions, "shutting down with unfinished sessions; they are not persisted");
    }
}
