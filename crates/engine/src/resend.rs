//! [`EmailTransport`] backed by the Resend HTTP API.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{EmailTransport, OutboundEmail, TransportError};

pub const DEFAULT_BASE_URL: &str = "https://api.resend.com";

#[derive(Clone, Debug)]
pub struct ResendTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl ResendTransport {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl EmailTransport for ResendTransport {
    async fn send_email(&self, email: &OutboundEmail<'_>) -> Result<String, TransportError> {
        let body = SendEmailRequest {
            from: email.from,
            to: [email.to],
            subject: email.subject,
            html: email.html,
        };

        let resp = self
            .client
            .post(self.url("/emails"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<SendEmailResponse>().await?.id);
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(err) => err.message,
            Err(_) => "provider error".to_string(),
        };
        Err(TransportError::Rejected { status, message })
    }
}
