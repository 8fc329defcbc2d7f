use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryOrder, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};

use crate::{
    EmailStatus, EmailSuppression, EngineError, ResultEngine, suppressions,
    suppressions::normalize_recipient, util::require_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Put a recipient on the suppression list on its own transaction.
    ///
    /// Only `bounced` and `complained` are accepted as reasons.
    pub async fn suppress(
        &self,
        recipient: &str,
        reason: EmailStatus,
        provider_message_id: &str,
    ) -> ResultEngine<()> {
        let recipient = require_text(recipient, "recipient")?;
        let provider_message_id = require_text(provider_message_id, "provider message id")?;
        if !reason.suppresses_recipient() {
            return Err(EngineError::InvalidStatus(format!(
                "{reason} does not suppress a recipient"
            )));
        }
        with_tx!(self, |db_tx| {
            suppress_in(&db_tx, recipient, reason, provider_message_id).await
        })
    }

    pub async fn is_suppressed(&self, recipient: &str) -> ResultEngine<bool> {
        Ok(self.suppression(recipient).await?.is_some())
    }

    pub async fn suppression(&self, recipient: &str) -> ResultEngine<Option<EmailSuppression>> {
        suppressions::Entity::find_by_id(normalize_recipient(recipient))
            .one(&self.database)
            .await?
            .map(EmailSuppression::try_from)
            .transpose()
    }

    /// Every suppressed recipient, oldest first.
    pub async fn suppressions(&self) -> ResultEngine<Vec<EmailSuppression>> {
        suppressions::Entity::find()
            .order_by_asc(suppressions::Column::CreatedAt)
            .order_by_asc(suppressions::Column::Recipient)
            .all(&self.database)
            .await?
            .into_iter()
            .map(EmailSuppression::try_from)
            .collect()
    }
}

/// Upsert keyed by recipient. A repeat only refreshes the causing message id;
/// `reason` and `created_at` keep their first values.
pub(super) async fn suppress_in<C: ConnectionTrait>(
    db: &C,
    recipient: &str,
    reason: EmailStatus,
    provider_message_id: &str,
) -> ResultEngine<()> {
    let recipient = normalize_recipient(recipient);
    let row = suppressions::ActiveModel {
        recipient: ActiveValue::Set(recipient.clone()),
        reason: ActiveValue::Set(reason.as_str().to_string()),
        provider_message_id: ActiveValue::Set(provider_message_id.to_string()),
        created_at: ActiveValue::Set(Utc::now()),
    };
    suppressions::Entity::insert(row)
        .on_conflict(
            OnConflict::column(suppressions::Column::Recipient)
                .update_column(suppressions::Column::ProviderMessageId)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::info!(
        recipient = %recipient,
        reason = %reason,
        provider_message_id,
        "recipient suppressed"
    );
    Ok(())
}
