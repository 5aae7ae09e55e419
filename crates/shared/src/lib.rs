pub mod acknowledgement;
pub mod config;
mod config_env;
pub mod dispatch;
pub mod form;
pub mod gateway;
pub mod handler;
pub mod models;
pub mod session_store;
pub mod telegram;
pub mod watchdog;

pub use acknowledgement::{AckOutcome, IgnoreReason, handle_acknowledgement};
pub use dispatch::{DispatchError, DispatchReceipt, compose_reminder_text, dispatch_reminder};
pub use gateway::{
    AckControl, ControlInteraction, DeliveredMessage, GatewayError, GatewayFuture, InboundEvent,
    MessagingGateway, OperatorCommand, OutgoingMessage,
};
pub use handler::{HandledEvent, HandlerError, ReminderBot};
pub use session_store::{SessionSnapshot, SessionStore};
pub use watchdog::{WATCHDOG_TICK, Watchdog, WatchdogOutcome};
