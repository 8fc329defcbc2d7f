use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*,
    sea_query::{Expr, OnConflict},
};

use crate::{
    EmailMessage, EmailStatus, ResultEngine, StatusMergeOutcome, messages,
    util::{normalize_optional_text, require_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Fold a candidate status into the message row on its own transaction.
    ///
    /// See [`merge_status_in`] for the merge rule.
    pub async fn merge_status(
        &self,
        provider_message_id: &str,
        recipient: &str,
        candidate: EmailStatus,
        at: DateTime<Utc>,
        error_text: Option<&str>,
    ) -> ResultEngine<StatusMergeOutcome> {
        let provider_message_id = require_text(provider_message_id, "provider message id")?;
        let recipient = require_text(recipient, "recipient")?;
        with_tx!(self, |db_tx| {
            merge_status_in(
                &db_tx,
                provider_message_id,
                recipient,
                candidate,
                at,
                error_text,
            )
            .await
        })
    }

    /// Current converged state of a message, if any event was seen for it.
    pub async fn message(&self, provider_message_id: &str) -> ResultEngine<Option<EmailMessage>> {
        messages::Entity::find_by_id(provider_message_id.trim().to_string())
            .one(&self.database)
            .await?
            .map(EmailMessage::try_from)
            .transpose()
    }
}

/// Monotonic merge of one observation into `email_messages`.
///
/// Every step is a single conditional statement, so racing writers on the
/// same row cannot interleave between a comparison and its write:
///
/// 1. insert the row as `sent` if it does not exist yet;
/// 2. take `candidate` only when it outranks the stored status;
/// 3. move `last_event_at` forward to `at` when `at` is later;
/// 4. overwrite `last_error` only with non-blank text.
pub(super) async fn merge_status_in<C: ConnectionTrait>(
    db: &C,
    provider_message_id: &str,
    recipient: &str,
    candidate: EmailStatus,
    at: DateTime<Utc>,
    error_text: Option<&str>,
) -> ResultEngine<StatusMergeOutcome> {
    let seed = messages::ActiveModel {
        provider_message_id: ActiveValue::Set(provider_message_id.to_string()),
        recipient: ActiveValue::Set(recipient.to_string()),
        status: ActiveValue::Set(EmailStatus::Sent.as_str().to_string()),
        status_rank: ActiveValue::Set(EmailStatus::Sent.rank()),
        last_event_at: ActiveValue::Set(at),
        last_error: ActiveValue::Set(None),
    };
    messages::Entity::insert(seed)
        .on_conflict(
            OnConflict::column(messages::Column::ProviderMessageId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let advanced = messages::Entity::update_many()
        .col_expr(messages::Column::Status, Expr::value(candidate.as_str()))
        .col_expr(messages::Column::StatusRank, Expr::value(candidate.rank()))
        .filter(messages::Column::ProviderMessageId.eq(provider_message_id))
        .filter(messages::Column::StatusRank.lt(candidate.rank()))
        .exec(db)
        .await?
        .rows_affected
        > 0;

    messages::Entity::update_many()
        .col_expr(messages::Column::LastEventAt, Expr::value(at))
        .filter(messages::Column::ProviderMessageId.eq(provider_message_id))
        .filter(messages::Column::LastEventAt.lt(at))
        .exec(db)
        .await?;

    if let Some(error_text) = normalize_optional_text(error_text) {
        messages::Entity::update_many()
            .col_expr(messages::Column::LastError, Expr::value(error_text))
            .filter(messages::Column::ProviderMessageId.eq(provider_message_id))
            .exec(db)
            .await?;
    }

    let model = messages::Entity::find_by_id(provider_message_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| {
            DbErr::RecordNotFound(format!("email message {provider_message_id} vanished"))
        })?;
    let message = EmailMessage::try_from(model)?;

    tracing::debug!(
        provider_message_id,
        candidate = %candidate,
        status = %message.status,
        advanced,
        "email status merged"
    );

    Ok(StatusMergeOutcome { advanced, message })
}
