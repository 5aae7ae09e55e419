use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::config::{BotConfig, ConfigError};
use crate::gateway::{
    AckControl, ControlInteraction, DeliveredMessage, FailureClass, GatewayError, GatewayFuture,
    InboundEvent, MessagingGateway, OperatorCommand, OutgoingMessage,
};
use crate::models::{ChannelId, MessageHandle, SessionId};

/// Telegram Bot API client speaking JSON over HTTPS.
#[derive(Clone)]
pub struct TelegramGateway {
    client: reqwest::Client,
    api_base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last_name) if !last_name.is_empty() => format!("{} {last_name}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

impl TelegramGateway {
    pub fn new(config: &BotConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .map_err(|err| {
                ConfigError::InvalidConfiguration(format!(
                    "failed to build telegram http client: {err}"
                ))
            })?;

        Ok(Self {
            client,
            api_base_url: config.telegram_api_base_url.trim_end_matches('/').to_string(),
            token: config.telegram_bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            // The request URL embeds the bot token.
            .map_err(|err| GatewayError::Transient {
                code: "TELEGRAM_NETWORK_ERROR".to_string(),
                message: format!("telegram {method} request failed: {}", err.without_url()),
            })?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|err| GatewayError::Transient {
                code: "TELEGRAM_BODY_READ_FAILED".to_string(),
                message: format!("telegram {method} body read failed: {}", err.without_url()),
            })?;

        let envelope = match serde_json::from_str::<ApiEnvelope<T>>(&raw_body) {
            Ok(envelope) => envelope,
            Err(err) if status.is_success() => {
                return Err(GatewayError::InvalidResponse(format!(
                    "telegram {method} response is not valid JSON: {err}"
                )));
            }
            Err(_) => {
                return Err(GatewayError::from_class(
                    classify_http_failure(status),
                    format!("TELEGRAM_HTTP_{}", status.as_u16()),
                    format!("telegram {method} responded with status {status}"),
                ));
            }
        };

        if !status.is_success() || !envelope.ok {
            let status = envelope
                .error_code
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(status);
            let description = envelope
                .description
                .unwrap_or_else(|| "no description".to_string());
            return Err(GatewayError::from_class(
                classify_http_failure(status),
                format!("TELEGRAM_HTTP_{}", status.as_u16()),
                format!("telegram {method} failed: {description}"),
            ));
        }

        envelope.result.ok_or_else(|| {
            GatewayError::InvalidResponse(format!("telegram {method} response has no result"))
        })
    }

    /// Long-polls for updates after `offset`, waiting up to `timeout_seconds`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, GatewayError> {
        let mut body = json!({
            "timeout": timeout_seconds,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        self.call("getUpdates", body).await
    }

    /// Drops updates queued while the bot was offline and returns the offset to resume from.
    pub async fn skip_pending_updates(&self) -> Result<Option<i64>, GatewayError> {
        let updates: Vec<Update> = self
            .call("getUpdates", json!({ "offset": -1, "timeout": 0 }))
            .await?;

        Ok(updates.last().map(|update| update.update_id + 1))
    }
}

impl MessagingGateway for TelegramGateway {
    fn send_message<'a>(
        &'a self,
        channel: &'a ChannelId,
        message: OutgoingMessage,
    ) -> GatewayFuture<'a, DeliveredMessage> {
        Box::pin(async move {
            let body = send_message_body(channel, &message);
            let sent: TelegramMessage = self.call("sendMessage", body).await?;
            Ok(DeliveredMessage {
                channel: ChannelId::from(sent.chat.id),
                handle: MessageHandle(sent.message_id),
            })
        })
    }

    fn delete_message<'a>(
        &'a self,
        channel: &'a ChannelId,
        message: MessageHandle,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let body = json!({
                "chat_id": chat_id_value(channel),
                "message_id": message.0,
            });
            let _: bool = self.call("deleteMessage", body).await?;
            Ok(())
        })
    }

    fn answer_interaction<'a>(
        &'a self,
        interaction_id: &'a str,
        text: Option<&'a str>,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut body = json!({ "callback_query_id": interaction_id });
            if let Some(text) = text {
                body["text"] = json!(text);
            }
            let _: bool = self.call("answerCallbackQuery", body).await?;
            Ok(())
        })
    }
}

/// Numeric chat ids go out as integers, `@username` addresses as strings.
fn chat_id_value(channel: &ChannelId) -> Value {
    match channel.as_str().trim().parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(channel.as_str().trim()),
    }
}

fn inline_keyboard(control: &AckControl) -> Value {
    let rows = control
        .options
        .iter()
        .map(|option| json!([{ "text": option.label, "callback_data": option.tag }]))
        .collect::<Vec<_>>();

    json!({ "inline_keyboard": rows })
}

pub(crate) fn send_message_body(channel: &ChannelId, message: &OutgoingMessage) -> Value {
    let mut body = Map::new();
    body.insert("chat_id".to_string(), chat_id_value(channel));
    body.insert("text".to_string(), json!(message.text));
    if let Some(control) = &message.control {
        body.insert("reply_markup".to_string(), inline_keyboard(control));
    }
    if let Some(reply_to) = message.reply_to {
        body.insert(
            "reply_parameters".to_string(),
            json!({ "message_id": reply_to.0, "allow_sending_without_reply": true }),
        );
    }

    Value::Object(body)
}

/// Converts a raw update into a gateway event; updates the bot does not act on yield `None`.
pub fn parse_update(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        let tag = query.data?;
        return Some(InboundEvent::ControlInteraction(ControlInteraction {
            interaction_id: query.id,
            channel: ChannelId::from(message.chat.id),
            message: MessageHandle(message.message_id),
            tag,
            responder_name: query.from.full_name(),
        }));
    }

    let message = update.message?;
    let text = message.text?;
    if text.trim().is_empty() {
        return None;
    }

    let chat_id = message.chat.id;
    let user_id = message.from.as_ref().map_or(chat_id, |user| user.id);
    let session_id = SessionId::for_chat_user(chat_id, user_id);
    let channel = ChannelId::from(chat_id);
    let handle = MessageHandle(message.message_id);

    match OperatorCommand::parse(&text) {
        Some(command) => Some(InboundEvent::Command {
            session_id,
            channel,
            message: handle,
            command,
        }),
        None => Some(InboundEvent::Text {
            session_id,
            channel,
            message: handle,
            text,
        }),
    }
}

fn classify_http_failure(status: StatusCode) -> FailureClass {
    match status.as_u16() {
        408 | 425 | 429 | 500 | 502 | 503 | 504 => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}
