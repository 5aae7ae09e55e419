use shared::config::BotConfig;
use shared::telegram::{TelegramGateway, parse_update};
use shared::{HandledEvent, ReminderBot};
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info};

use crate::{PollBatchMetrics, retry_delay_seconds};

/// Long-polls Telegram and feeds every update to the bot, one at a time and in order.
pub(crate) async fn run_polling(
    bot: &ReminderBot,
    telegram: &TelegramGateway,
    config: &BotConfig,
    mut offset: Option<i64>,
) {
    let mut consecutive_failures = 0_u32;

    loop {
        let updates = match telegram
            .get_updates(offset, config.poll_timeout_seconds)
            .await
        {
            Ok(updates) => {
                consecutive_failures = 0;
                updates
            }
            Err(err) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                let delay_seconds = retry_delay_seconds(
                    config.poll_retry_base_seconds,
                    config.poll_retry_max_seconds,
                    consecutive_failures,
                );
                error!(
                    consecutive_failures,
                    delay_seconds, "failed to fetch telegram updates: {err}"
                );
                sleep(Duration::from_secs(delay_seconds)).await;
                continue;
            }
        };

        if updates.is_empty() {
            continue;
        }

        let mut metrics = PollBatchMetrics {
            received_updates: updates.len(),
            ..PollBatchMetrics::default()
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let update_id = update.update_id;

            let Some(event) = parse_update(update) else {
                metrics.skipped_updates += 1;
                debug!(update_id, "skipping update without actionable content");
                continue;
            };

            match bot.handle_event(event).await {
                Ok(handled) => metrics.record(&handled),
                Err(err) => {
                    metrics.failed_events += 1;
                    error!(update_id, "failed to handle update: {err}");
                }
            }
        }

        info!(
            received_updates = metrics.received_updates,
            skipped_updates = metrics.skipped_updates,
            dispatched_reminders = metrics.dispatched_reminders,
            acknowledgements = metrics.acknowledgements,
            rejected_inputs = metrics.rejected_inputs,
            failed_events = metrics.failed_events,
            next_offset = offset,
            "telegram poll batch metrics"
        );
    }
}

impl PollBatchMetrics {
    pub(crate) fn record(&mut self, handled: &HandledEvent) {
        match handled {
            HandledEvent::Dispatched(_) => self.dispatched_reminders += 1,
            HandledEvent::Acknowledgement(_) => self.acknowledgements += 1,
            HandledEvent::Rejected(_) => self.rejected_inputs += 1,
            HandledEvent::Ignored => self.skipped_updates += 1,
            HandledEvent::Greeted | HandledEvent::FormStarted | HandledEvent::Prompted => {}
        }
    }
}
