//! Outbound email dispatch with a bounded retry policy.
//!
//! The dispatcher never touches the store: the status of a sent message is
//! only learnt later, from the provider's webhooks.

use std::{future::Future, time::Duration};

use thiserror::Error;

/// A message ready to hand to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub html: &'a str,
}

/// Capability to hand one email to a provider.
///
/// Implementations return the provider message id, the same id later found
/// in the provider's webhooks.
pub trait EmailTransport: Send + Sync {
    fn send_email(
        &self,
        email: &OutboundEmail<'_>,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected the email ({status}): {message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("email failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

/// How hard the dispatcher tries before giving up.
///
/// The delay after failed attempt `n` is `n * backoff_base`; there is no
/// delay after the last attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

/// Sends email through a transport, retrying failed attempts.
#[derive(Debug)]
pub struct Dispatcher<T> {
    transport: T,
    from: String,
    policy: RetryPolicy,
}

impl<T: EmailTransport> Dispatcher<T> {
    pub fn new(transport: T, from: impl Into<String>) -> Self {
        Self {
            transport,
            from: from.into(),
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one email and return the provider message id.
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html: &str,
    ) -> Result<String, DispatchError> {
        let to = recipient.trim();
        if to.is_empty() {
            return Err(DispatchError::InvalidRecipient(
                "recipient must not be empty".to_string(),
            ));
        }

        let email = OutboundEmail {
            from: &self.from,
            to,
            subject,
            html,
        };
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let result = tokio::time::timeout(
                self.policy.attempt_timeout,
                self.transport.send_email(&email),
            )
            .await;

            let err = match result {
                Ok(Ok(provider_message_id)) => {
                    tracing::info!(
                        email = to,
                        provider_message_id = %provider_message_id,
                        attempt,
                        "email sent"
                    );
                    return Ok(provider_message_id);
                }
                Ok(Err(err)) => err,
                Err(_) => TransportError::Timeout(self.policy.attempt_timeout),
            };

            tracing::warn!(email = to, attempt, "email send failed: {err}");

            if attempt >= max_attempts {
                return Err(DispatchError::Exhausted {
                    attempts: max_attempts,
                    source: err,
                });
            }

            tokio::time::sleep(self.policy.backoff_for(attempt)).await;
            attempt += 1;
        }
    }
}
