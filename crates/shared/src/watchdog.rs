use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info};

use crate::gateway::{MessagingGateway, OutgoingMessage};
use crate::models::{AckSignal, ChannelId, Reminder, ReminderId, SessionId};
use crate::session_store::SessionStore;

/// Granularity at which the acknowledgement window is counted down.
pub const WATCHDOG_TICK: Duration = Duration::from_secs(1);

pub fn escalation_text(recipient_id: &ChannelId) -> String {
    format!("Сотрудник ({recipient_id}) проигнорировал задачу")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// The recipient answered before the window ran out.
    Acknowledged,
    /// The window ran out and the operator was notified.
    Escalated,
    /// The session was restarted, taking the reminder with it.
    Superseded,
}

/// Supervises one delivered reminder until it is acknowledged or its window expires.
pub struct Watchdog {
    store: SessionStore,
    gateway: Arc<dyn MessagingGateway>,
    session_id: SessionId,
    reminder_id: ReminderId,
    recipient_id: ChannelId,
    operator_channel_id: ChannelId,
    window_minutes: u32,
    ack_observer: watch::Receiver<AckSignal>,
}

impl Watchdog {
    pub fn new(
        store: SessionStore,
        gateway: Arc<dyn MessagingGateway>,
        session_id: SessionId,
        reminder_id: ReminderId,
        reminder: &Reminder,
        ack_observer: watch::Receiver<AckSignal>,
    ) -> Self {
        Self {
            store,
            gateway,
            session_id,
            reminder_id,
            recipient_id: reminder.recipient_id.clone(),
            operator_channel_id: reminder.operator_channel_id.clone(),
            window_minutes: reminder.window_minutes,
            ack_observer,
        }
    }

    pub fn spawn(self) -> JoinHandle<WatchdogOutcome> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> WatchdogOutcome {
        // A zero-minute window still gets one tick for an acknowledgement to land.
        let budget_ticks = u64::from(self.window_minutes).saturating_mul(60).max(1);
        let mut ticker = time::interval_at(Instant::now() + WATCHDOG_TICK, WATCHDOG_TICK);
        let mut elapsed_ticks = 0_u64;

        info!(
            session_id = %self.session_id,
            reminder_id = %self.reminder_id,
            recipient = %self.recipient_id,
            window_minutes = self.window_minutes,
            "watchdog started"
        );

        let outcome = loop {
            tokio::select! {
                biased;
                changed = self.ack_observer.changed() => {
                    match changed {
                        Ok(()) => {
                            if let Some(outcome) = self.observe() {
                                break outcome;
                            }
                        }
                        Err(_) => break self.observe().unwrap_or(WatchdogOutcome::Superseded),
                    }
                }
                _ = ticker.tick() => {
                    elapsed_ticks += 1;
                    if let Some(outcome) = self.observe() {
                        break outcome;
                    }
                    if elapsed_ticks >= budget_ticks {
                        break self.escalate().await;
                    }
                }
            }
        };

        info!(
            session_id = %self.session_id,
            reminder_id = %self.reminder_id,
            outcome = ?outcome,
            elapsed_seconds = elapsed_ticks,
            "watchdog finished"
        );
        outcome
    }

    fn observe(&mut self) -> Option<WatchdogOutcome> {
        match *self.ack_observer.borrow_and_update() {
            AckSignal::Acknowledged(_) => Some(WatchdogOutcome::Acknowledged),
            AckSignal::Pending => None,
        }
    }

    async fn escalate(&mut self) -> WatchdogOutcome {
        // Retiring first makes escalation and acknowledgement mutually exclusive.
        if self
            .store
            .retire_expired(&self.session_id, self.reminder_id)
            .is_none()
        {
            debug!(
                session_id = %self.session_id,
                reminder_id = %self.reminder_id,
                "reminder left the store before expiry; skipping escalation"
            );
            return self.observe().unwrap_or(WatchdogOutcome::Superseded);
        }

        let notice = OutgoingMessage::text(escalation_text(&self.recipient_id));
        if let Err(err) = self
            .gateway
            .send_message(&self.operator_channel_id, notice)
            .await
        {
            error!(
                session_id = %self.session_id,
                reminder_id = %self.reminder_id,
                operator = %self.operator_channel_id,
                "failed to send escalation: {err}"
            );
        }

        WatchdogOutcome::Escalated
    }
}
