//! Decoded webhook input and its validation.

use chrono::{DateTime, Utc};

use crate::{EmailEvent, EmailStatus};

/// A provider webhook after authenticity was checked and the body decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebhookPayload {
    pub event_type: String,
    pub message_id: String,
    /// First recipient of the message.
    pub recipient: String,
    pub error: Option<String>,
    /// RFC 3339 timestamp of the event as reported by the provider.
    pub created_at: Option<String>,
}

/// Why an event was acknowledged without touching the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownEventType(String),
    MissingMessageId,
    MissingRecipient,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEventType(tag) => write!(f, "unknown event type: {tag}"),
            Self::MissingMessageId => f.write_str("missing message id"),
            Self::MissingRecipient => f.write_str("missing recipient"),
        }
    }
}

impl WebhookPayload {
    /// Validate the payload and build the ledger event for it.
    ///
    /// `received_at` stands in for `created_at` when the provider omitted it
    /// or sent something that is not RFC 3339.
    pub(crate) fn accept(
        &self,
        raw_payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<(EmailStatus, EmailEvent), IgnoreReason> {
        let event_type = self.event_type.trim();
        let status = EmailStatus::from_event_type(event_type)
            .ok_or_else(|| IgnoreReason::UnknownEventType(event_type.to_string()))?;

        let message_id = self.message_id.trim();
        if message_id.is_empty() {
            return Err(IgnoreReason::MissingMessageId);
        }
        let recipient = self.recipient.trim();
        if recipient.is_empty() {
            return Err(IgnoreReason::MissingRecipient);
        }

        let occurred_at = self
            .created_at
            .as_deref()
            .and_then(parse_occurred_at)
            .unwrap_or(received_at);

        Ok((
            status,
            EmailEvent {
                provider_message_id: message_id.to_string(),
                event_type: event_type.to_string(),
                recipient: recipient.to_string(),
                error_text: crate::util::normalize_optional_text(self.error.as_deref()),
                occurred_at,
                raw_payload: raw_payload.to_vec(),
            },
        ))
    }
}

fn parse_occurred_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn payload(event_type: &str) -> WebhookPayload {
        WebhookPayload {
            event_type: event_type.to_string(),
            message_id: "msg-1".to_string(),
            recipient: "alice@example.com".to_string(),
            error: None,
            created_at: Some("2026-10-01T10:00:05+02:00".to_string()),
        }
    }

    #[test]
    fn accepted_event_carries_provider_timestamp_in_utc() {
        let now = Utc::now();
        let (status, event) = payload("email.delivered").accept(b"{}", now).unwrap();

        assert_eq!(status, EmailStatus::Delivered);
        assert_eq!(
            event.occurred_at,
            Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 5).unwrap()
        );
        assert_eq!(event.raw_payload, b"{}".to_vec());
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_receive_time() {
        let now = Utc.with_ymd_and_hms(2026, 10, 2, 0, 0, 0).unwrap();
        let mut p = payload("email.bounced");
        p.created_at = Some("yesterday".to_string());
        let (_, event) = p.accept(b"", now).unwrap();
        assert_eq!(event.occurred_at, now);

        p.created_at = None;
        let (_, event) = p.accept(b"", now).unwrap();
        assert_eq!(event.occurred_at, now);
    }

    #[test]
    fn blank_error_is_dropped() {
        let mut p = payload("email.failed");
        p.error = Some("   ".to_string());
        let (_, event) = p.accept(b"", Utc::now()).unwrap();
        assert_eq!(event.error_text, None);

        p.error = Some(" mailbox full ".to_string());
        let (_, event) = p.accept(b"", Utc::now()).unwrap();
        assert_eq!(event.error_text.as_deref(), Some("mailbox full"));
    }

    #[test]
    fn rejects_unknown_type_and_missing_ids() {
        assert_eq!(
            payload("email.opened").accept(b"", Utc::now()).unwrap_err(),
            IgnoreReason::UnknownEventType("email.opened".to_string())
        );

        let mut p = payload("email.bounced");
        p.message_id = " ".to_string();
        assert_eq!(
            p.accept(b"", Utc::now()).unwrap_err(),
            IgnoreReason::MissingMessageId
        );

        let mut p = payload("email.bounced");
        p.recipient.clear();
        assert_eq!(
            p.accept(b"", Utc::now()).unwrap_err(),
            IgnoreReason::MissingRecipient
        );
    }
}
