//! Resend batch API transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{BatchMailer, OutboundEmail};
use crate::error::{CampaignError, CampaignResult};

const DEFAULT_BASE_URL: &str = "https://api.resend.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mail transport backed by the Resend HTTP API.
///
/// Batches go through `POST /emails/batch`, which accepts up to 100 messages
/// per call and reports one result for the whole call.
#[derive(Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ResendMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendErrorBody {
    message: Option<String>,
}

impl ResendMailer {
    pub fn new() -> CampaignResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the transport at a different endpoint (tests, proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> CampaignResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                CampaignError::Transport(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn to_message<'a>(email: &'a OutboundEmail) -> ResendMessage<'a> {
        ResendMessage {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        }
    }

    async fn error_from_response(response: reqwest::Response) -> CampaignError {
        let status = response.status();
        let message = response
            .json::<ResendErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("provider returned HTTP {}", status));

        CampaignError::Transport(message)
    }
}

#[async_trait]
impl BatchMailer for ResendMailer {
    async fn send_batch(&self, api_key: &str, emails: &[OutboundEmail]) -> CampaignResult<()> {
        debug!(count = emails.len(), "Submitting batch to Resend");

        let messages: Vec<ResendMessage<'_>> = emails.iter().map(Self::to_message).collect();

        let response = self
            .client
            .post(format!("{}/emails/batch", self.base_url))
            .bearer_auth(api_key)
            .json(&messages)
            .send()
            .await
            .map_err(|e| CampaignError::Transport(format!("batch request failed: {}", e)))?;

        if !response.status().is_success() {
            let err = Self::error_from_response(response).await;
            error!(count = emails.len(), error = %err, "Batch send failed");
            return Err(err);
        }

        info!(count = emails.len(), "Batch accepted by Resend");
        Ok(())
    }

    async fn send_single(&self, api_key: &str, email: &OutboundEmail) -> CampaignResult<()> {
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&Self::to_message(email))
            .send()
            .await
            .map_err(|e| CampaignError::Transport(format!("send request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        info!(to = %email.to, "Test email accepted by Resend");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let email = OutboundEmail {
            from: "Relay <noreply@example.com>".to_string(),
            to: "jane@example.com".to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
        };

        let value = serde_json::to_value(ResendMailer::to_message(&email)).unwrap();
        assert_eq!(value["from"], "Relay <noreply@example.com>");
        assert_eq!(value["to"], serde_json::json!(["jane@example.com"]));
        assert_eq!(value["subject"], "Hello");
        assert_eq!(value["html"], "<p>Hi</p>");
    }
}
