//! Ledger record types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::status::{BookingStatus, PaymentStatus};

/// Authoritative booking record (the fields this core touches).
///
/// Created by the booking-creation path, mutated only through the
/// [`super::LedgerAccessor`], never deleted by this core.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Booking {
    pub booking_id: i64,
    /// Customer who owns the booking (cache keys are derived from this)
    pub owner_id: i64,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub total_price: Decimal,
    pub currency: String,
    /// Set once a provider-side payment attempt exists
    pub provider_tx_id: Option<String>,
    /// Last payment failure reason, for support tooling
    pub failure_reason: Option<String>,
    pub refunded_amount: Option<Decimal>,
    /// When the cleaning is scheduled to start
    pub scheduled_at: DateTime<Utc>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Provider-side payment attempt, keyed by the provider transaction id.
///
/// Time-boxed methods (instant QR payments) carry an `expires_at`;
/// attempts past it that never reached a terminal state are failed by
/// reconciliation without a provider round-trip.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentAttempt {
    pub tx_id: String,
    pub booking_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PaymentAttempt {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Read-only payment-state projection of a booking
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentStateView {
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub provider_tx_id: Option<String>,
}

impl From<&Booking> for PaymentStateView {
    fn from(booking: &Booking) -> Self {
        Self {
            payment_status: booking.payment_status,
            booking_status: booking.booking_status,
            provider_tx_id: booking.provider_tx_id.clone(),
        }
    }
}
