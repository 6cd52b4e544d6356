//! Storage seam for the payment ledger.
//!
//! The backend contract the accessor builds on: conditional
//! ("compare current state, then set") updates plus idempotency-token
//! bookkeeping. [`super::PgLedgerStore`] is the production implementation;
//! [`super::MemoryLedgerStore`] mirrors its semantics for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::status::{BookingStatus, PaymentStatus};
use super::types::{Booking, PaymentAttempt};

/// Columns written together by one conditional payment-state update.
///
/// Payment and booking status move in the same statement so the §3
/// invariant (paid implies an active booking) can never be observed torn.
#[derive(Debug, Clone)]
pub struct PaymentStateUpdate {
    pub payment_status: PaymentStatus,
    /// `None` leaves the booking status untouched
    pub booking_status: Option<BookingStatus>,
    pub failure_reason: Option<String>,
    pub refunded_amount: Option<Decimal>,
}

impl PaymentStateUpdate {
    pub fn paid() -> Self {
        Self {
            payment_status: PaymentStatus::Paid,
            booking_status: Some(BookingStatus::Confirmed),
            failure_reason: None,
            refunded_amount: None,
        }
    }

    pub fn failed(reason: &str) -> Self {
        Self {
            payment_status: PaymentStatus::Failed,
            booking_status: None,
            failure_reason: Some(reason.to_string()),
            refunded_amount: None,
        }
    }

    pub fn refunded(amount: Decimal) -> Self {
        Self {
            payment_status: PaymentStatus::Refunded,
            booking_status: Some(BookingStatus::Cancelled),
            failure_reason: None,
            refunded_amount: Some(amount),
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn fetch_booking(&self, booking_id: i64) -> Result<Option<Booking>, LedgerError>;

    /// Atomic conditional update: apply `update` only if the booking's
    /// current payment status matches `expected`.
    ///
    /// Returns the updated row, or `None` when the guard missed (another
    /// writer got there first, or the state never matched).
    async fn update_payment_state_if(
        &self,
        booking_id: i64,
        expected: PaymentStatus,
        update: PaymentStateUpdate,
    ) -> Result<Option<Booking>, LedgerError>;

    async fn fetch_attempt(&self, tx_id: &str) -> Result<Option<PaymentAttempt>, LedgerError>;

    /// Conditional attempt-status update; true if this caller won the write
    async fn update_attempt_status_if(
        &self,
        tx_id: &str,
        expected: PaymentStatus,
        new: PaymentStatus,
    ) -> Result<bool, LedgerError>;

    /// Non-terminal attempts created before `cutoff`, oldest first, bounded
    async fn find_open_attempts(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, LedgerError>;

    /// Record a webhook idempotency token; true if newly recorded,
    /// false if a previous delivery already applied it
    async fn mark_event_applied(&self, token: &str) -> Result<bool, LedgerError>;

    async fn event_applied(&self, token: &str) -> Result<bool, LedgerError>;

    /// Confirmed bookings scheduled inside the window that have not been
    /// reminded yet (reminder dispatch job)
    async fn find_bookings_needing_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, LedgerError>;

    /// Idempotent reminder claim; true if this caller claimed it
    async fn mark_reminder_sent(&self, booking_id: i64) -> Result<bool, LedgerError>;
}
