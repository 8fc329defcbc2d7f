//! The module contains `EmailMessage`, the converged state of one sent email.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::{EmailStatus, EngineError};

/// Current delivery state of a message, keyed by the provider message id.
///
/// Rows are created lazily by the first webhook event for the id and are
/// only ever moved forward by the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub provider_message_id: String,
    pub recipient: String,
    pub status: EmailStatus,
    /// Latest `occurred_at` observed for this message, whatever its status.
    pub last_event_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Result of folding one event into a message row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMergeOutcome {
    /// `true` when the candidate outranked the stored status.
    pub advanced: bool,
    pub message: EmailMessage,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider_message_id: String,
    pub recipient: String,
    pub status: String,
    /// Mirror of `EmailStatus::rank` for `status`, compared in SQL.
    pub status_rank: i32,
    pub last_event_at: DateTimeUtc,
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for EmailMessage {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        let status = EmailStatus::try_from(value.status.as_str())?;
        if status.rank() != value.status_rank {
            return Err(EngineError::InvalidStatus(format!(
                "status {status} stored with rank {}",
                value.status_rank
            )));
        }
        Ok(Self {
            provider_message_id: value.provider_message_id,
            recipient: value.recipient,
            status,
            last_event_at: value.last_event_at,
            last_error: value.last_error,
        })
    }
}
