//! Resend delivery-status webhook.
//!
//! The provider retries any delivery that is not answered with a 2xx, so
//! every event that can never become valid is acknowledged with 200 and only
//! infrastructure failures surface as an error status.

use api_types::webhook::{AckStatus, ResendWebhookPayload, WebhookAck};
use axum::{Json, body::Bytes, extract::State};
use engine::{ReconcileOutcome, WebhookPayload};

use crate::{ServerError, server::ServerState};

fn map_payload(payload: ResendWebhookPayload) -> WebhookPayload {
    let recipient = payload.recipient().unwrap_or_default().to_string();
    WebhookPayload {
        event_type: payload.event_type,
        message_id: payload.data.email_id,
        recipient,
        error: payload.data.error,
        created_at: payload.created_at.or(payload.data.created_at),
    }
}

fn ignored(reason: impl Into<String>) -> Json<WebhookAck> {
    Json(WebhookAck {
        status: AckStatus::Ignored,
        reason: Some(reason.into()),
    })
}

pub async fn resend(
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServerError> {
    let payload: ResendWebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!("resend webhook body rejected: {err}");
            return Ok(ignored("invalid json"));
        }
    };

    let event_type = payload.event_type.clone();
    let email_id = payload.data.email_id.clone();
    let decoded = map_payload(payload);

    let result = tokio::time::timeout(
        state.webhook_deadline,
        state.engine.handle_event(&body, &decoded),
    )
    .await
    .map_err(|_| {
        tracing::error!(
            event_type = %event_type,
            email_id = %email_id,
            "resend webhook deadline exceeded"
        );
        ServerError::Timeout
    })?;

    match result {
        Ok(ReconcileOutcome::Applied(_)) => Ok(Json(WebhookAck {
            status: AckStatus::Applied,
            reason: None,
        })),
        Ok(ReconcileOutcome::Ignored(reason)) => Ok(ignored(reason.to_string())),
        Err(err) if !err.is_retryable() => {
            tracing::warn!(
                event_type = %event_type,
                email_id = %email_id,
                "resend webhook dropped: {err}"
            );
            Ok(ignored(err.to_string()))
        }
        Err(err) => {
            tracing::error!(
                event_type = %event_type,
                email_id = %email_id,
                "resend webhook handle failed"
            );
            Err(err.into())
        }
    }
}
