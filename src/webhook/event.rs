//! Provider webhook event payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settlement::PaymentOutcome;

/// Event types this core applies. Anything else fails deserialization
/// and is rejected before touching the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "payment.confirmed")]
    PaymentConfirmed,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "payment.refunded")]
    PaymentRefunded,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PaymentConfirmed => "payment.confirmed",
            EventType::PaymentFailed => "payment.failed",
            EventType::PaymentRefunded => "payment.refunded",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Signed provider notification body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_type: EventType,
    pub transaction_id: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl PaymentEvent {
    /// Deduplication key: a given (transaction, event type) pair is
    /// applied at most once no matter how often it is delivered.
    pub fn idempotency_token(&self) -> String {
        format!("{}:{}", self.transaction_id, self.event_type)
    }

    /// Reduce the event to the shared settlement outcome. Refund events
    /// may carry a partial amount; absent, the attempt's amount is used.
    pub fn outcome(&self, attempt_amount: Decimal) -> PaymentOutcome {
        match self.event_type {
            EventType::PaymentConfirmed => PaymentOutcome::Confirmed,
            EventType::PaymentFailed => PaymentOutcome::Failed {
                reason: "provider reported failure".to_string(),
            },
            EventType::PaymentRefunded => PaymentOutcome::Refunded {
                amount: self.amount.unwrap_or(attempt_amount),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_confirmed_event() {
        let payload = r#"{
            "event_type": "payment.confirmed",
            "transaction_id": "tx-abc",
            "amount": "100.00",
            "currency": "BRL",
            "occurred_at": "2026-03-01T12:00:00Z"
        }"#;

        let event: PaymentEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.event_type, EventType::PaymentConfirmed);
        assert_eq!(event.idempotency_token(), "tx-abc:payment.confirmed");
    }

    #[test]
    fn test_unknown_event_type_fails_parse() {
        let payload = r#"{
            "event_type": "payout.created",
            "transaction_id": "tx-abc",
            "occurred_at": "2026-03-01T12:00:00Z"
        }"#;

        assert!(serde_json::from_str::<PaymentEvent>(payload).is_err());
    }

    #[test]
    fn test_refund_outcome_defaults_to_attempt_amount() {
        let event = PaymentEvent {
            event_type: EventType::PaymentRefunded,
            transaction_id: "tx-abc".to_string(),
            amount: None,
            currency: None,
            occurred_at: Utc::now(),
        };

        let attempt_amount = Decimal::new(10000, 2);
        assert_eq!(
            event.outcome(attempt_amount),
            PaymentOutcome::Refunded {
                amount: attempt_amount
            }
        );
    }
}
