use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::acknowledgement::{AckOutcome, handle_acknowledgement};
use crate::dispatch::{DispatchError, DispatchReceipt, dispatch_reminder};
use crate::form::{
    self, FormError, FormTransition, PROMPT_RECIPIENT, SET_REMINDER_INTRO, START_GREETING,
};
use crate::gateway::{
    GatewayError, InboundEvent, MessagingGateway, OperatorCommand, OutgoingMessage,
};
use crate::models::{ChannelId, MessageHandle, SessionId};
use crate::session_store::{BeginOutcome, SessionStore};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Transport(#[from] GatewayError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug)]
pub enum HandledEvent {
    Greeted,
    FormStarted,
    Prompted,
    Rejected(FormError),
    Dispatched(DispatchReceipt),
    Acknowledgement(AckOutcome),
    Ignored,
}

/// Routes inbound gateway events to the form, dispatch and acknowledgement logic.
///
/// Events for one session must be handled one at a time, in arrival order.
#[derive(Clone)]
pub struct ReminderBot {
    store: SessionStore,
    gateway: Arc<dyn MessagingGateway>,
}

impl ReminderBot {
    pub fn new(store: SessionStore, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn handle_event(&self, event: InboundEvent) -> Result<HandledEvent, HandlerError> {
        match event {
            InboundEvent::Command {
                session_id,
                channel,
                message,
                command,
            } => self
                .handle_command(&session_id, &channel, message, command)
                .await
                .map_err(HandlerError::from),
            InboundEvent::Text {
                session_id,
                channel,
                message,
                text,
            } => self.handle_text(&session_id, &channel, message, &text).await,
            InboundEvent::ControlInteraction(interaction) => {
                handle_acknowledgement(self.gateway.as_ref(), &self.store, &interaction)
                    .await
                    .map(HandledEvent::Acknowledgement)
                    .map_err(HandlerError::from)
            }
        }
    }

    async fn handle_command(
        &self,
        session_id: &SessionId,
        channel: &ChannelId,
        message: MessageHandle,
        command: OperatorCommand,
    ) -> Result<HandledEvent, GatewayError> {
        match command {
            OperatorCommand::Start => {
                self.gateway
                    .send_message(channel, OutgoingMessage::text(START_GREETING))
                    .await?;
                Ok(HandledEvent::Greeted)
            }
            OperatorCommand::SetReminder => {
                if let BeginOutcome::SupersededReminder(reminder_id) = self.store.begin(session_id)
                {
                    info!(
                        session_id = %session_id,
                        reminder_id = %reminder_id,
                        "new form replaced a live reminder"
                    );
                }

                self.gateway
                    .send_message(
                        channel,
                        OutgoingMessage::text(SET_REMINDER_INTRO).replying_to(message),
                    )
                    .await?;
                self.gateway
                    .send_message(channel, OutgoingMessage::text(PROMPT_RECIPIENT))
                    .await?;
                Ok(HandledEvent::FormStarted)
            }
        }
    }

    async fn handle_text(
        &self,
        session_id: &SessionId,
        channel: &ChannelId,
        message: MessageHandle,
        text: &str,
    ) -> Result<HandledEvent, HandlerError> {
        match form::advance(&self.store, session_id, channel, text) {
            Ok(FormTransition::Prompt(prompt)) => {
                self.gateway
                    .send_message(channel, OutgoingMessage::text(prompt))
                    .await?;
                Ok(HandledEvent::Prompted)
            }
            Ok(FormTransition::ReadyToDispatch) => {
                let receipt = dispatch_reminder(&self.gateway, &self.store, session_id).await?;
                Ok(HandledEvent::Dispatched(receipt))
            }
            Err(err) => match err.corrective_reply() {
                Some(reply) => {
                    self.gateway
                        .send_message(channel, OutgoingMessage::text(reply).replying_to(message))
                        .await?;
                    Ok(HandledEvent::Rejected(err))
                }
                None => {
                    debug!(session_id = %session_id, "dropping text input: {err}");
                    Ok(HandledEvent::Ignored)
                }
            },
        }
    }
}
