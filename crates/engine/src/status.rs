//! Delivery statuses and their total order.
//!
//! A message only ever moves up this table:
//! `sent < delivered < failed < bounced < complained`.

use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Sent,
    Delivered,
    Failed,
    Bounced,
    Complained,
}

impl EmailStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Bounced => "bounced",
            Self::Complained => "complained",
        }
    }

    pub fn rank(self) -> i32 {
        match self {
            Self::Sent => 0,
            Self::Delivered => 1,
            Self::Failed => 2,
            Self::Bounced => 3,
            Self::Complained => 4,
        }
    }

    /// Statuses that put the recipient on the suppression list.
    pub fn suppresses_recipient(self) -> bool {
        matches!(self, Self::Bounced | Self::Complained)
    }

    /// Map a provider event tag (`email.bounced`, ...) to a status.
    ///
    /// Returns `None` for tags that carry no delivery fate, such as
    /// `email.opened` or `email.delivery_delayed`.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "email.sent" => Some(Self::Sent),
            "email.delivered" => Some(Self::Delivered),
            "email.failed" => Some(Self::Failed),
            "email.bounced" => Some(Self::Bounced),
            "email.complained" => Some(Self::Complained),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EmailStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            "bounced" => Ok(Self::Bounced),
            "complained" => Ok(Self::Complained),
            other => Err(EngineError::InvalidStatus(format!(
                "unknown email status: {other}"
            ))),
        }
    }
}
