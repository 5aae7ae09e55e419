use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::gateway::{AckControl, GatewayError, MessagingGateway, OutgoingMessage};
use crate::models::{ChannelId, MessageHandle, Reminder, ReminderId, SessionId};
use crate::session_store::SessionStore;
use crate::watchdog::{Watchdog, WatchdogOutcome};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("session {0} has no complete reminder to dispatch")]
    IncompleteSession(SessionId),
    #[error("session {0} was reset while the reminder was being delivered")]
    SessionReset(SessionId),
    #[error(transparent)]
    Transport(#[from] GatewayError),
}

/// A delivered reminder and the watchdog supervising it.
#[derive(Debug)]
pub struct DispatchReceipt {
    pub reminder_id: ReminderId,
    /// Chat the reminder landed in; acknowledgements are matched against it.
    pub channel: ChannelId,
    pub message: MessageHandle,
    pub watchdog: JoinHandle<WatchdogOutcome>,
}

pub fn compose_reminder_text(reminder: &Reminder) -> String {
    format!(
        "{} {}\nЗадача: {}\nВремя на выполнение: {}",
        reminder.due_date,
        reminder.due_time_hhmm(),
        reminder.text,
        reminder.window_minutes
    )
}

/// Delivers the reminder collected in `session_id` to its recipient and starts its watchdog.
///
/// A failed delivery clears the session and is not retried.
pub async fn dispatch_reminder(
    gateway: &Arc<dyn MessagingGateway>,
    store: &SessionStore,
    session_id: &SessionId,
) -> Result<DispatchReceipt, DispatchError> {
    let reminder = store
        .reminder(session_id)
        .ok_or_else(|| DispatchError::IncompleteSession(session_id.clone()))?;

    let outgoing = OutgoingMessage::text(compose_reminder_text(&reminder))
        .with_control(AckControl::done_or_not_done());
    let delivered = match gateway.send_message(&reminder.recipient_id, outgoing).await {
        Ok(delivered) => delivered,
        Err(err) => {
            error!(
                session_id = %session_id,
                recipient = %reminder.recipient_id,
                "failed to deliver reminder: {err}"
            );
            store.clear(session_id);
            return Err(err.into());
        }
    };

    let reminder_id = ReminderId::new();
    let Some(ack_observer) = store.attach_delivery(session_id, reminder_id, delivered.clone())
    else {
        warn!(
            session_id = %session_id,
            recipient = %reminder.recipient_id,
            message = %delivered.handle,
            "session changed during delivery; reminder left unsupervised"
        );
        return Err(DispatchError::SessionReset(session_id.clone()));
    };

    info!(
        session_id = %session_id,
        reminder_id = %reminder_id,
        recipient = %reminder.recipient_id,
        delivered_chat = %delivered.channel,
        message = %delivered.handle,
        "reminder delivered"
    );

    let watchdog = Watchdog::new(
        store.clone(),
        Arc::clone(gateway),
        session_id.clone(),
        reminder_id,
        &reminder,
        ack_observer,
    )
    .spawn();

    Ok(DispatchReceipt {
        reminder_id,
        channel: delivered.channel,
        message: delivered.handle,
        watchdog,
    })
}
