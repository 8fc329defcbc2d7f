use serde::{Deserialize, Serialize};

pub mod webhook {
    use super::*;

    /// Delivery-status event posted by Resend.
    ///
    /// Every field defaults when missing so that a partially filled body can
    /// still be decoded and rejected by validation instead of by serde.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct ResendWebhookPayload {
        #[serde(rename = "type", default)]
        pub event_type: String,
        /// RFC 3339 timestamp of the event.
        #[serde(default)]
        pub created_at: Option<String>,
        #[serde(default)]
        pub data: ResendEventData,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct ResendEventData {
        #[serde(default)]
        pub email_id: String,
        #[serde(default)]
        pub to: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub subject: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub created_at: Option<String>,
    }

    impl ResendWebhookPayload {
        /// First recipient of the message, if any.
        pub fn recipient(&self) -> Option<&str> {
            self.data.to.first().map(String::as_str)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AckStatus {
        Applied,
        Ignored,
    }

    /// Body returned to the provider for every acknowledged delivery.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct WebhookAck {
        pub status: AckStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub reason: Option<String>,
    }
}

pub mod error {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ErrorBody {
        pub error: String,
    }
}
