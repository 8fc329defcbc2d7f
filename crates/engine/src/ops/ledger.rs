use sea_orm::{
    ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};

use crate::{EmailEvent, ResultEngine, events, util::require_text};

use super::{Engine, with_tx};

impl Engine {
    /// Store a webhook event in the ledger on its own transaction.
    ///
    /// Re-recording the same `(provider_message_id, event_type)` overwrites
    /// that row; rows of other event types are left alone.
    pub async fn record_event(&self, event: &EmailEvent) -> ResultEngine<()> {
        require_text(&event.provider_message_id, "provider message id")?;
        require_text(&event.event_type, "event type")?;
        with_tx!(self, |db_tx| record_event_in(&db_tx, event).await)
    }

    /// Ledger rows for a message, oldest first.
    pub async fn events_for(&self, provider_message_id: &str) -> ResultEngine<Vec<EmailEvent>> {
        let rows = events::Entity::find()
            .filter(events::Column::ProviderMessageId.eq(provider_message_id.trim()))
            .order_by_asc(events::Column::OccurredAt)
            .order_by_asc(events::Column::EventType)
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(EmailEvent::from).collect())
    }
}

pub(super) async fn record_event_in<C: ConnectionTrait>(
    db: &C,
    event: &EmailEvent,
) -> ResultEngine<()> {
    events::Entity::insert(events::ActiveModel::from(event))
        .on_conflict(
            OnConflict::columns([
                events::Column::ProviderMessageId,
                events::Column::EventType,
            ])
            .update_columns([
                events::Column::OccurredAt,
                events::Column::ErrorText,
                events::Column::RawPayload,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::debug!(
        provider_message_id = %event.provider_message_id,
        event_type = %event.event_type,
        "email event recorded"
    );
    Ok(())
}
