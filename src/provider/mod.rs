//! Abstract payment provider client.
//!
//! The external gateway is modeled as an opaque system that can be asked
//! for a transaction's current status and may deliver webhooks at most
//! once, possibly out of order or duplicated. The trait is the seam; the
//! HTTP client is the production implementation and the mock drives tests.

pub mod http;
pub mod mock;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

pub use http::HttpProviderClient;
pub use mock::MockProviderClient;

/// Provider-reported payment status.
///
/// Everything except `Pending` is terminal from the provider's point of
/// view; `Expired` is how time-boxed methods (QR instant payments) report
/// a charge the customer never completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    Confirmed,
    Failed,
    Refunded,
    Expired,
}

impl ProviderStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProviderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Pending => "pending",
            ProviderStatus::Confirmed => "confirmed",
            ProviderStatus::Failed => "failed",
            ProviderStatus::Refunded => "refunded",
            ProviderStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transient(String),

    #[error("provider request timed out")]
    Timeout,

    #[error("unknown payment attempt: {0}")]
    UnknownAttempt(String),

    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),
}

impl ProviderError {
    /// Transient errors self-heal on the next reconciliation tick
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Timeout)
    }
}

#[async_trait]
pub trait PaymentProviderClient: Send + Sync {
    /// Start a provider-side payment attempt, returning its transaction id
    async fn initiate_payment(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String, ProviderError>;

    /// Current status of an attempt, as the provider sees it
    async fn get_status(&self, attempt_id: &str) -> Result<ProviderStatus, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!ProviderStatus::Pending.is_terminal());
        assert!(ProviderStatus::Confirmed.is_terminal());
        assert!(ProviderStatus::Failed.is_terminal());
        assert!(ProviderStatus::Refunded.is_terminal());
        assert!(ProviderStatus::Expired.is_terminal());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let status: ProviderStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(status, ProviderStatus::Confirmed);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"confirmed\"");
    }

    #[test]
    fn test_error_transience() {
        assert!(ProviderError::Transient("conn refused".to_string()).is_transient());
        assert!(ProviderError::Timeout.is_transient());
        assert!(!ProviderError::UnknownAttempt("tx".to_string()).is_transient());
        assert!(!ProviderError::UnexpectedResponse("bad".to_string()).is_transient());
    }
}
