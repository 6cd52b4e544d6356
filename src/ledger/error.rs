use rust_decimal::Decimal;
use thiserror::Error;

use super::status::PaymentStatus;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("booking not found: {0}")]
    NotFound(i64),

    #[error("invalid transition {from} -> {to} for booking {booking_id}")]
    InvalidTransition {
        booking_id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("invalid refund amount {amount} for booking {booking_id} (total {total})")]
    InvalidRefundAmount {
        booking_id: i64,
        amount: Decimal,
        total: Decimal,
    },

    #[error("ledger storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl LedgerError {
    /// Transient failures are retried with backoff; everything else is
    /// surfaced or logged exactly once.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}
