use tracing::{info, warn};

use crate::gateway::{ControlInteraction, GatewayError, MessagingGateway, OutgoingMessage};
use crate::models::{AckChoice, SessionId};
use crate::session_store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownTag,
    /// Already acknowledged, already escalated, or never dispatched.
    NoActiveReminder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    Confirmed {
        session_id: SessionId,
        choice: AckChoice,
    },
    Ignored(IgnoreReason),
}

pub fn confirmation_text(choice: AckChoice, responder_name: &str) -> String {
    format!("{} от {responder_name}", choice.label())
}

/// Handles the recipient pressing one of the acknowledgement buttons.
///
/// Taking the reminder out of the store stops its watchdog; the operator is
/// then told who answered and the delivered reminder is retracted.
pub async fn handle_acknowledgement(
    gateway: &dyn MessagingGateway,
    store: &SessionStore,
    interaction: &ControlInteraction,
) -> Result<AckOutcome, GatewayError> {
    let Some(choice) = AckChoice::from_tag(&interaction.tag) else {
        warn!(
            interaction_id = %interaction.interaction_id,
            tag = %interaction.tag,
            "ignoring control interaction with unknown tag"
        );
        gateway
            .answer_interaction(&interaction.interaction_id, None)
            .await?;
        return Ok(AckOutcome::Ignored(IgnoreReason::UnknownTag));
    };

    let Some(acknowledged) =
        store.take_acknowledged(&interaction.channel, interaction.message, choice)
    else {
        warn!(
            interaction_id = %interaction.interaction_id,
            channel = %interaction.channel,
            message = %interaction.message,
            "ignoring acknowledgement without an active reminder"
        );
        gateway
            .answer_interaction(&interaction.interaction_id, None)
            .await?;
        return Ok(AckOutcome::Ignored(IgnoreReason::NoActiveReminder));
    };

    info!(
        session_id = %acknowledged.session_id,
        reminder_id = %acknowledged.reminder_id,
        recipient = %acknowledged.recipient_id,
        choice = choice.tag(),
        "reminder acknowledged"
    );

    gateway
        .send_message(
            &acknowledged.operator_channel_id,
            OutgoingMessage::text(confirmation_text(choice, &interaction.responder_name)),
        )
        .await?;
    gateway
        .delete_message(&interaction.channel, acknowledged.message)
        .await?;
    gateway
        .answer_interaction(&interaction.interaction_id, None)
        .await?;

    Ok(AckOutcome::Confirmed {
        session_id: acknowledged.session_id,
        choice,
    })
}

#[cfg(test)]
mod tests {
    use super::confirmation_text;
    use crate::models::AckChoice;

    #[test]
    fn confirmation_names_label_and_responder() {
        assert_eq!(
            confirmation_text(AckChoice::Done, "Ivan Petrov"),
            "Выполнено от Ivan Petrov"
        );
        assert_eq!(
            confirmation_text(AckChoice::NotDone, "Ivan"),
            "Не сделано от Ivan"
        );
    }
}
