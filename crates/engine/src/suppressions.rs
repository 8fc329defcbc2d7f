//! Recipients that must not receive further mail.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::{EmailStatus, EngineError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailSuppression {
    pub recipient: String,
    /// The terminal status that first put the recipient here.
    pub reason: EmailStatus,
    /// Most recent message that triggered the suppression.
    pub provider_message_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_suppressions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub recipient: String,
    pub reason: String,
    pub provider_message_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for EmailSuppression {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            reason: EmailStatus::try_from(value.reason.as_str())?,
            recipient: value.recipient,
            provider_message_id: value.provider_message_id,
            created_at: value.created_at,
        })
    }
}

/// Canonical form used as the suppression key.
pub(crate) fn normalize_recipient(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
