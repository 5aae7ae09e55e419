use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{AckChoice, ChannelId, MessageHandle, SessionId};

pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transient transport failure [{code}]: {message}")]
    Transient { code: String, message: String },
    #[error("permanent transport failure [{code}]: {message}")]
    Permanent { code: String, message: String },
    #[error("transport returned an invalid payload: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    pub fn from_class(class: FailureClass, code: String, message: String) -> Self {
        match class {
            FailureClass::Transient => Self::Transient { code, message },
            FailureClass::Permanent => Self::Permanent { code, message },
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            Self::Transient { .. } => FailureClass::Transient,
            Self::Permanent { .. } | Self::InvalidResponse(_) => FailureClass::Permanent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOption {
    pub label: String,
    pub tag: String,
}

/// Mutually exclusive answer buttons rendered under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckControl {
    pub options: Vec<ControlOption>,
}

impl AckControl {
    pub fn done_or_not_done() -> Self {
        Self {
            options: AckChoice::ALL
                .into_iter()
                .map(|choice| ControlOption {
                    label: choice.label().to_string(),
                    tag: choice.tag().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub control: Option<AckControl>,
    pub reply_to: Option<MessageHandle>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            control: None,
            reply_to: None,
        }
    }

    pub fn with_control(mut self, control: AckControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn replying_to(mut self, message: MessageHandle) -> Self {
        self.reply_to = Some(message);
        self
    }
}

/// A sent message as the transport reports it back.
///
/// `channel` is the canonical chat the message landed in, which can differ from
/// the address it was sent to (`@username`, zero-padded ids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub channel: ChannelId,
    pub handle: MessageHandle,
}

/// Bidirectional chat transport the reminder core talks through.
pub trait MessagingGateway: Send + Sync {
    fn send_message<'a>(
        &'a self,
        channel: &'a ChannelId,
        message: OutgoingMessage,
    ) -> GatewayFuture<'a, DeliveredMessage>;

    fn delete_message<'a>(
        &'a self,
        channel: &'a ChannelId,
        message: MessageHandle,
    ) -> GatewayFuture<'a, ()>;

    /// Confirms receipt of a control interaction so the client stops waiting.
    fn answer_interaction<'a>(
        &'a self,
        interaction_id: &'a str,
        text: Option<&'a str>,
    ) -> GatewayFuture<'a, ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Start,
    SetReminder,
}

impl OperatorCommand {
    /// Parses `/start` and `/set_reminder`, tolerating a `@botname` suffix and trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let command = text.split_whitespace().next()?.strip_prefix('/')?;
        let command = command.split_once('@').map_or(command, |(name, _)| name);
        match command {
            "start" => Some(Self::Start),
            "set_reminder" => Some(Self::SetReminder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInteraction {
    pub interaction_id: String,
    /// Chat the acknowledged reminder was delivered to.
    pub channel: ChannelId,
    pub message: MessageHandle,
    pub tag: String,
    pub responder_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        session_id: SessionId,
        channel: ChannelId,
        message: MessageHandle,
        command: OperatorCommand,
    },
    Text {
        session_id: SessionId,
        channel: ChannelId,
        message: MessageHandle,
        text: String,
    },
    ControlInteraction(ControlInteraction),
}
