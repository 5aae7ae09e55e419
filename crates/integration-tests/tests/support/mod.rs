#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use shared::gateway::{FailureClass, GatewayError};
use shared::models::{ChannelId, MessageHandle, SessionId};
use shared::telegram::{Update, parse_update};
use shared::{
    DeliveredMessage, GatewayFuture, HandledEvent, InboundEvent, MessagingGateway,
    OperatorCommand, OutgoingMessage, ReminderBot, SessionStore,
};
use tokio::sync::Mutex;

pub const OPERATOR_CHAT: i64 = 7;
pub const OPERATOR_USER: i64 = 7;
pub const RECIPIENT_CHAT: i64 = 42;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: ChannelId,
    pub handle: MessageHandle,
    pub message: OutgoingMessage,
}

#[derive(Debug, Default)]
struct GatewayLog {
    sent: Vec<SentMessage>,
    deleted: Vec<(ChannelId, MessageHandle)>,
    answered: Vec<String>,
    fail_sends_to: Vec<ChannelId>,
    usernames: HashMap<String, i64>,
    next_handle: i64,
}

impl GatewayLog {
    /// Resolves an address to the chat it reaches, the way Telegram reports it back.
    fn resolve(&self, channel: &ChannelId) -> ChannelId {
        let address = channel.as_str().trim();
        if let Ok(chat_id) = address.parse::<i64>() {
            return ChannelId::from(chat_id);
        }

        self.usernames
            .get(address)
            .map_or_else(|| channel.clone(), |chat_id| ChannelId::from(*chat_id))
    }
}

/// In-memory transport that records every call and hands out increasing message handles.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    log: Arc<Mutex<GatewayLog>>,
}

impl RecordingGateway {
    pub async fn register_username(&self, username: &str, chat_id: i64) {
        self.log
            .lock()
            .await
            .usernames
            .insert(username.to_string(), chat_id);
    }

    pub async fn fail_sends_to(&self, channel: ChannelId) {
        self.log.lock().await.fail_sends_to.push(channel);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.log.lock().await.sent.clone()
    }

    pub async fn texts_to(&self, channel: &ChannelId) -> Vec<String> {
        self.log
            .lock()
            .await
            .sent
            .iter()
            .filter(|sent| &sent.channel == channel)
            .map(|sent| sent.message.text.clone())
            .collect()
    }

    pub async fn deleted(&self) -> Vec<(ChannelId, MessageHandle)> {
        self.log.lock().await.deleted.clone()
    }

    pub async fn answered(&self) -> Vec<String> {
        self.log.lock().await.answered.clone()
    }
}

impl MessagingGateway for RecordingGateway {
    fn send_message<'a>(
        &'a self,
        channel: &'a ChannelId,
        message: OutgoingMessage,
    ) -> GatewayFuture<'a, DeliveredMessage> {
        Box::pin(async move {
            let mut log = self.log.lock().await;
            if log.fail_sends_to.contains(channel) {
                return Err(GatewayError::from_class(
                    FailureClass::Permanent,
                    "TELEGRAM_HTTP_400".to_string(),
                    "Bad Request: chat not found".to_string(),
                ));
            }

            log.next_handle += 1;
            let handle = MessageHandle(100 + log.next_handle);
            let resolved = log.resolve(channel);
            log.sent.push(SentMessage {
                channel: resolved.clone(),
                handle,
                message,
            });
            Ok(DeliveredMessage {
                channel: resolved,
                handle,
            })
        })
    }

    fn delete_message<'a>(
        &'a self,
        channel: &'a ChannelId,
        message: MessageHandle,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.log
                .lock()
                .await
                .deleted
                .push((channel.clone(), message));
            Ok(())
        })
    }

    fn answer_interaction<'a>(
        &'a self,
        interaction_id: &'a str,
        _text: Option<&'a str>,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.log
                .lock()
                .await
                .answered
                .push(interaction_id.to_string());
            Ok(())
        })
    }
}

pub fn build_bot() -> (ReminderBot, RecordingGateway) {
    let gateway = RecordingGateway::default();
    let bot = ReminderBot::new(SessionStore::new(), Arc::new(gateway.clone()));
    (bot, gateway)
}

pub fn operator_session() -> SessionId {
    SessionId::for_chat_user(OPERATOR_CHAT, OPERATOR_USER)
}

pub fn operator_channel() -> ChannelId {
    ChannelId::from(OPERATOR_CHAT)
}

pub fn recipient_channel() -> ChannelId {
    ChannelId::from(RECIPIENT_CHAT)
}

pub fn command(command: OperatorCommand) -> InboundEvent {
    InboundEvent::Command {
        session_id: operator_session(),
        channel: operator_channel(),
        message: MessageHandle(1),
        command,
    }
}

pub fn text(input: &str) -> InboundEvent {
    InboundEvent::Text {
        session_id: operator_session(),
        channel: operator_channel(),
        message: MessageHandle(2),
        text: input.to_string(),
    }
}

/// A button press by the recipient, decoded from a raw callback update.
pub fn press(tag: &str, message: MessageHandle, responder_name: &str) -> InboundEvent {
    let update: Update = serde_json::from_value(json!({
        "update_id": 1,
        "callback_query": {
            "id": format!("cbq-{tag}-{}", message.0),
            "from": { "id": RECIPIENT_CHAT, "first_name": responder_name },
            "message": { "message_id": message.0, "chat": { "id": RECIPIENT_CHAT } },
            "data": tag
        }
    }))
    .expect("callback update should deserialize");

    parse_update(update).expect("callback update should yield an event")
}

/// Runs `/set_reminder` followed by the five field inputs and returns the last handled event.
pub async fn fill_form(bot: &ReminderBot, inputs: [&str; 5]) -> HandledEvent {
    bot.handle_event(command(OperatorCommand::SetReminder))
        .await
        .expect("set_reminder should be handled");

    let mut last = HandledEvent::Ignored;
    for input in inputs {
        last = bot
            .handle_event(text(input))
            .await
            .expect("form input should be handled");
    }
    last
}
