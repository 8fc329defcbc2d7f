use chrono::Utc;
use sea_orm::TransactionTrait;

use crate::{EmailMessage, EngineError, IgnoreReason, ResultEngine, WebhookPayload};

use super::{
    Engine, ledger::record_event_in, messages::merge_status_in, suppressions::suppress_in,
    with_tx,
};

/// What happened to an event that reached the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedEvent {
    pub message: EmailMessage,
    /// The event outranked the previous status.
    pub advanced: bool,
    /// The recipient was (re)written to the suppression list.
    pub suppressed: bool,
}

/// Result of handling one webhook delivery.
///
/// Both variants must be acknowledged to the provider as success.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(AppliedEvent),
    Ignored(IgnoreReason),
}

impl Engine {
    /// Reconcile one webhook event.
    ///
    /// Invalid events (unknown type, blank message id or recipient) are
    /// returned as [`ReconcileOutcome::Ignored`] without touching the store.
    /// Otherwise the ledger write, the status merge and the eventual
    /// suppression commit together or not at all. An `Err` is always an
    /// infrastructure failure and the event should be delivered again.
    pub async fn handle_event(
        &self,
        raw_payload: &[u8],
        payload: &WebhookPayload,
    ) -> ResultEngine<ReconcileOutcome> {
        let (status, event) = match payload.accept(raw_payload, Utc::now()) {
            Ok(accepted) => accepted,
            Err(reason) => {
                tracing::warn!(
                    event_type = %payload.event_type,
                    provider_message_id = %payload.message_id,
                    "email webhook ignored: {reason}"
                );
                return Ok(ReconcileOutcome::Ignored(reason));
            }
        };

        tracing::debug!(
            provider_message_id = %event.provider_message_id,
            event_type = %event.event_type,
            "apply email status start"
        );

        let applied = with_tx!(self, |db_tx| {
            record_event_in(&db_tx, &event).await?;

            let merge = merge_status_in(
                &db_tx,
                &event.provider_message_id,
                &event.recipient,
                status,
                event.occurred_at,
                event.error_text.as_deref(),
            )
            .await?;

            let suppressed = merge.advanced && status.suppresses_recipient();
            if suppressed {
                suppress_in(
                    &db_tx,
                    &event.recipient,
                    status,
                    &event.provider_message_id,
                )
                .await?;
            }

            Ok::<_, EngineError>(AppliedEvent {
                message: merge.message,
                advanced: merge.advanced,
                suppressed,
            })
        })?;

        tracing::info!(
            provider_message_id = %event.provider_message_id,
            event_type = %event.event_type,
            status = %applied.message.status,
            advanced = applied.advanced,
            suppressed = applied.suppressed,
            "email webhook applied"
        );

        Ok(ReconcileOutcome::Applied(applied))
    }
}
