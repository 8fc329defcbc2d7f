//! The event ledger: one row per `(provider_message_id, event_type)`.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};

/// A webhook event as accepted by the reconciler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailEvent {
    pub provider_message_id: String,
    /// Provider tag, e.g. `email.bounced`.
    pub event_type: String,
    pub recipient: String,
    pub error_text: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Body exactly as received, kept for audit and replay.
    pub raw_payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider_message_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_type: String,
    pub recipient: String,
    pub error_text: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub raw_payload: Vec<u8>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&EmailEvent> for ActiveModel {
    fn from(value: &EmailEvent) -> Self {
        Self {
            provider_message_id: ActiveValue::Set(value.provider_message_id.clone()),
            event_type: ActiveValue::Set(value.event_type.clone()),
            recipient: ActiveValue::Set(value.recipient.clone()),
            error_text: ActiveValue::Set(value.error_text.clone()),
            occurred_at: ActiveValue::Set(value.occurred_at),
            raw_payload: ActiveValue::Set(value.raw_payload.clone()),
        }
    }
}

impl From<Model> for EmailEvent {
    fn from(value: Model) -> Self {
        Self {
            provider_message_id: value.provider_message_id,
            event_type: value.event_type,
            recipient: value.recipient,
            error_text: value.error_text,
            occurred_at: value.occurred_at,
            raw_payload: value.raw_payload,
        }
    }
}
