use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveTime;
use tokio::sync::watch;

use crate::gateway::DeliveredMessage;
use crate::models::{
    AckChoice, AckSignal, ChannelId, FormStep, MessageHandle, Reminder, ReminderId, SessionId,
};

/// Per-operator conversation state.
#[derive(Debug)]
pub struct Session {
    pub step: FormStep,
    pub recipient_id: Option<ChannelId>,
    pub reminder_text: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<NaiveTime>,
    pub window_minutes: Option<u32>,
    pub operator_channel_id: Option<ChannelId>,
    delivery: Option<Delivery>,
}

#[derive(Debug)]
struct Delivery {
    reminder_id: ReminderId,
    channel: ChannelId,
    message: MessageHandle,
    ack_signal: watch::Sender<AckSignal>,
}

impl Session {
    fn awaiting_recipient() -> Self {
        Self {
            step: FormStep::AwaitingRecipient,
            recipient_id: None,
            reminder_text: None,
            due_date: None,
            due_time: None,
            window_minutes: None,
            operator_channel_id: None,
            delivery: None,
        }
    }

    pub fn reminder(&self) -> Option<Reminder> {
        Some(Reminder {
            recipient_id: self.recipient_id.clone()?,
            text: self.reminder_text.clone()?,
            due_date: self.due_date.clone()?,
            due_time: self.due_time?,
            window_minutes: self.window_minutes?,
            operator_channel_id: self.operator_channel_id.clone()?,
        })
    }

    pub fn delivered_message_id(&self) -> Option<MessageHandle> {
        self.delivery.as_ref().map(|delivery| delivery.message)
    }

    /// Chat the reminder landed in, as reported by the transport.
    pub fn delivered_channel_id(&self) -> Option<&ChannelId> {
        self.delivery.as_ref().map(|delivery| &delivery.channel)
    }

    pub fn reminder_id(&self) -> Option<ReminderId> {
        self.delivery.as_ref().map(|delivery| delivery.reminder_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            step: self.step,
            recipient_id: self.recipient_id.clone(),
            reminder_text: self.reminder_text.clone(),
            due_date: self.due_date.clone(),
            due_time: self.due_time,
            window_minutes: self.window_minutes,
            operator_channel_id: self.operator_channel_id.clone(),
            delivered_channel_id: self.delivered_channel_id().cloned(),
            delivered_message_id: self.delivered_message_id(),
        }
    }
}

/// Read-only copy of a session for callers outside the store lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub step: FormStep,
    pub recipient_id: Option<ChannelId>,
    pub reminder_text: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<NaiveTime>,
    pub window_minutes: Option<u32>,
    pub operator_channel_id: Option<ChannelId>,
    pub delivered_channel_id: Option<ChannelId>,
    pub delivered_message_id: Option<MessageHandle>,
}

/// A reminder removed from the store by its acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgedReminder {
    pub session_id: SessionId,
    pub reminder_id: ReminderId,
    pub operator_channel_id: ChannelId,
    pub recipient_id: ChannelId,
    pub message: MessageHandle,
}

/// Outcome of starting a new form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    /// A live reminder belonged to the overwritten session; its watchdog stops without escalating.
    SupersededReminder(ReminderId),
}

/// Process-wide session map. Cloning shares the same map.
///
/// Every operation completes inside one critical section and never holds the
/// lock across an await point, so interleaved session tasks observe whole
/// mutations only.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets the session to the first form step, overwriting anything stored.
    pub fn begin(&self, session_id: &SessionId) -> BeginOutcome {
        let previous = self
            .lock()
            .insert(session_id.clone(), Session::awaiting_recipient());

        match previous.and_then(|session| session.reminder_id()) {
            Some(reminder_id) => BeginOutcome::SupersededReminder(reminder_id),
            None => BeginOutcome::Started,
        }
    }

    pub fn step(&self, session_id: &SessionId) -> FormStep {
        self.lock()
            .get(session_id)
            .map(|session| session.step)
            .unwrap_or(FormStep::Idle)
    }

    pub fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        self.lock().get(session_id).map(Session::snapshot)
    }

    pub fn reminder(&self, session_id: &SessionId) -> Option<Reminder> {
        self.lock().get(session_id).and_then(Session::reminder)
    }

    /// Applies `apply` to the session while holding the store lock.
    pub fn update<T>(
        &self,
        session_id: &SessionId,
        apply: impl FnOnce(&mut Session) -> T,
    ) -> Option<T> {
        self.lock().get_mut(session_id).map(apply)
    }

    /// Records the delivered message of a dispatched session and hands out the
    /// acknowledgement signal its watchdog observes.
    ///
    /// Returns `None` when the session is no longer in the dispatched step or
    /// already carries a delivery.
    pub fn attach_delivery(
        &self,
        session_id: &SessionId,
        reminder_id: ReminderId,
        delivered: DeliveredMessage,
    ) -> Option<watch::Receiver<AckSignal>> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(session_id)?;
        if session.step != FormStep::Dispatched || session.delivery.is_some() {
            return None;
        }

        let (ack_signal, ack_observer) = watch::channel(AckSignal::Pending);
        session.delivery = Some(Delivery {
            reminder_id,
            channel: delivered.channel,
            message: delivered.handle,
            ack_signal,
        });
        Some(ack_observer)
    }

    pub fn clear(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        self.lock()
            .remove(session_id)
            .map(|session| session.snapshot())
    }

    /// Removes the session whose reminder landed as `message` in `channel` and
    /// fires its acknowledgement signal. `channel` is compared against the chat
    /// the transport reported on delivery, not the address the operator typed.
    /// This is the only path that clears acknowledgement state; a second call
    /// for the same message finds nothing.
    pub fn take_acknowledged(
        &self,
        channel: &ChannelId,
        message: MessageHandle,
        choice: AckChoice,
    ) -> Option<AcknowledgedReminder> {
        let mut sessions = self.lock();
        let session_id = sessions
            .iter()
            .find(|(_, session)| {
                session.delivered_channel_id() == Some(channel)
                    && session.delivered_message_id() == Some(message)
            })
            .map(|(session_id, _)| session_id.clone())?;

        let session = sessions.remove(&session_id)?;
        let delivery = session.delivery?;
        let operator_channel_id = session.operator_channel_id?;
        let recipient_id = session.recipient_id?;
        delivery.ack_signal.send_replace(AckSignal::Acknowledged(choice));

        Some(AcknowledgedReminder {
            session_id,
            reminder_id: delivery.reminder_id,
            operator_channel_id,
            recipient_id,
            message: delivery.message,
        })
    }

    /// Removes the session once its acknowledgement window has run out, but
    /// only if it still carries `reminder_id`.
    pub fn retire_expired(
        &self,
        session_id: &SessionId,
        reminder_id: ReminderId,
    ) -> Option<SessionSnapshot> {
        let mut sessions = self.lock();
        let owns_reminder = sessions
            .get(session_id)
            .and_then(Session::reminder_id)
            .is_some_and(|current| current == reminder_id);
        if !owns_reminder {
            return None;
        }

        sessions.remove(session_id).map(|session| session.snapshot())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
