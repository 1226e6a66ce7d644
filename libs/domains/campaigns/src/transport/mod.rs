//! Mail transport implementations.
//!
//! The engine submits a whole batch in one call and receives a single
//! success/error for the call. No per-message granularity is assumed, which
//! is why a failed call marks the entire batch failed.

mod resend;

pub use resend::ResendMailer;

use async_trait::async_trait;

use crate::error::CampaignResult;

/// One addressed, fully rendered message.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    /// Formatted sender, e.g. `Jane <jane@example.com>`
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// A provider that accepts batches of addressed messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchMailer: Send + Sync {
    /// Submit up to one batch of messages in a single call. The result
    /// covers the whole call; partial outcomes are not reported.
    async fn send_batch(&self, api_key: &str, emails: &[OutboundEmail]) -> CampaignResult<()>;

    /// Send a single message (settings verification).
    async fn send_single(&self, api_key: &str, email: &OutboundEmail) -> CampaignResult<()>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
