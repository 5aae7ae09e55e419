use std::fmt;

use chrono::NaiveTime;
use uuid::Uuid;

/// Identity of one operator conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Session key for a user inside a chat, mirroring per-chat, per-user form state.
    pub fn for_chat_user(chat_id: i64, user_id: i64) -> Self {
        Self(format!("{chat_id}:{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a chat the gateway can deliver to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ChannelId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a delivered message, needed to retract it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub i64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReminderId(Uuid);

impl ReminderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStep {
    AwaitingRecipient,
    AwaitingText,
    AwaitingDate,
    AwaitingTime,
    AwaitingWindow,
    Dispatched,
    Idle,
}

impl FormStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingRecipient => "awaiting_recipient",
            Self::AwaitingText => "awaiting_text",
            Self::AwaitingDate => "awaiting_date",
            Self::AwaitingTime => "awaiting_time",
            Self::AwaitingWindow => "awaiting_window",
            Self::Dispatched => "dispatched",
            Self::Idle => "idle",
        }
    }

    pub fn is_collecting(&self) -> bool {
        !matches!(self, Self::Dispatched | Self::Idle)
    }
}

impl fmt::Display for FormStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recipient's answer on the acknowledgement control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckChoice {
    Done,
    NotDone,
}

impl AckChoice {
    pub const ALL: [Self; 2] = [Self::Done, Self::NotDone];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::NotDone => "not_done",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Done => "Выполнено",
            Self::NotDone => "Не сделано",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|choice| choice.tag() == tag)
    }
}

/// Observable acknowledgement state of a delivered reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckSignal {
    Pending,
    Acknowledged(AckChoice),
}

/// A fully collected reminder, ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub recipient_id: ChannelId,
    pub text: String,
    /// Canonical `DD.MM.YYYY`.
    pub due_date: String,
    pub due_time: NaiveTime,
    pub window_minutes: u32,
    pub operator_channel_id: ChannelId,
}

impl Reminder {
    pub fn due_time_hhmm(&self) -> String {
        self.due_time.format("%H:%M").to_string()
    }
}
