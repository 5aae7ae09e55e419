use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::models::{ChannelId, FormStep, SessionId};
use crate::session_store::{Session, SessionStore};

pub const START_GREETING: &str =
    "Привет! Я бот напоминаний.\nВоспользуйся командой для создания напоминания: /set_reminder";
pub const SET_REMINDER_INTRO: &str = "Для создания напоминания введите следующие данные: \
     телеграм ID сотрудника, текст напоминания, дату (ДД.ММ.ГГГГ), \
     время (ЧЧ:ММ) и время на ответ (в минутах).";
pub const PROMPT_RECIPIENT: &str = "Введите телеграм ID сотрудника";
pub const PROMPT_TEXT: &str = "Введите текст напоминания.";
pub const PROMPT_DATE: &str = "Введите дату (ДД.ММ.ГГГГ).";
pub const PROMPT_TIME: &str = "Введите время (ЧЧ:ММ).";
pub const PROMPT_WINDOW: &str = "Введите время на ответ (в минутах).";

pub const INVALID_DATE_REPLY: &str =
    "Неправильный формат даты. Введите дату в формате ДД.ММ.ГГГГ.";
pub const INVALID_TIME_REPLY: &str =
    "Неправильный формат времени. Введите время в формате ЧЧ:ММ.";
pub const INVALID_WINDOW_REPLY: &str =
    "Неправильный формат времени на ответ. Введите число в минутах.";

const DUE_DATE_FORMAT: &str = "%d.%m.%Y";
const DUE_TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("invalid date format")]
    InvalidDate,
    #[error("invalid time format")]
    InvalidTime,
    #[error("invalid number format")]
    InvalidWindow,
    #[error("empty input")]
    EmptyInput,
    #[error("input is not expected in step {step}")]
    UnexpectedInput { step: FormStep },
}

impl FormError {
    /// Reply sent back in the same turn; `None` means the input is dropped silently.
    pub fn corrective_reply(&self) -> Option<&'static str> {
        match self {
            Self::InvalidDate => Some(INVALID_DATE_REPLY),
            Self::InvalidTime => Some(INVALID_TIME_REPLY),
            Self::InvalidWindow => Some(INVALID_WINDOW_REPLY),
            Self::EmptyInput | Self::UnexpectedInput { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormTransition {
    /// Field stored; ask for the next one.
    Prompt(&'static str),
    /// Last field stored; the session is now dispatched and awaits delivery.
    ReadyToDispatch,
}

/// Parses a strict `DD.MM.YYYY` calendar date and returns it re-serialized canonically.
pub fn parse_due_date(raw: &str) -> Result<String, FormError> {
    NaiveDate::parse_from_str(raw.trim(), DUE_DATE_FORMAT)
        .map(|date| date.format(DUE_DATE_FORMAT).to_string())
        .map_err(|_| FormError::InvalidDate)
}

pub fn parse_due_time(raw: &str) -> Result<NaiveTime, FormError> {
    NaiveTime::parse_from_str(raw.trim(), DUE_TIME_FORMAT).map_err(|_| FormError::InvalidTime)
}

pub fn parse_window_minutes(raw: &str) -> Result<u32, FormError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| FormError::InvalidWindow)
}

/// Feeds one operator message into the session's current step.
///
/// The whole step runs under the store lock: either the field is written and
/// the step advances, or nothing changes.
pub fn advance(
    store: &SessionStore,
    session_id: &SessionId,
    operator_channel: &ChannelId,
    input: &str,
) -> Result<FormTransition, FormError> {
    store
        .update(session_id, |session| {
            apply_input(session, operator_channel, input)
        })
        .unwrap_or(Err(FormError::UnexpectedInput {
            step: FormStep::Idle,
        }))
}

fn apply_input(
    session: &mut Session,
    operator_channel: &ChannelId,
    input: &str,
) -> Result<FormTransition, FormError> {
    if session.step.is_collecting() && input.trim().is_empty() {
        return Err(FormError::EmptyInput);
    }

    match session.step {
        FormStep::AwaitingRecipient => {
            session.recipient_id = Some(ChannelId::new(input.trim()));
            session.step = FormStep::AwaitingText;
            Ok(FormTransition::Prompt(PROMPT_TEXT))
        }
        FormStep::AwaitingText => {
            session.reminder_text = Some(input.to_string());
            session.step = FormStep::AwaitingDate;
            Ok(FormTransition::Prompt(PROMPT_DATE))
        }
        FormStep::AwaitingDate => {
            session.due_date = Some(parse_due_date(input)?);
            session.step = FormStep::AwaitingTime;
            Ok(FormTransition::Prompt(PROMPT_TIME))
        }
        FormStep::AwaitingTime => {
            session.due_time = Some(parse_due_time(input)?);
            session.step = FormStep::AwaitingWindow;
            Ok(FormTransition::Prompt(PROMPT_WINDOW))
        }
        FormStep::AwaitingWindow => {
            session.window_minutes = Some(parse_window_minutes(input)?);
            session.operator_channel_id = Some(operator_channel.clone());
            session.step = FormStep::Dispatched;
            Ok(FormTransition::ReadyToDispatch)
        }
        step @ (FormStep::Dispatched | FormStep::Idle) => Err(FormError::UnexpectedInput { step }),
    }
}
