//! In-memory ledger store.
//!
//! Mirrors [`super::PgLedgerStore`]'s conditional-update semantics behind
//! a single write lock, so the concurrency properties of the accessor can
//! be exercised without a database. Also usable as a standalone harness
//! when wiring the service against fixtures.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::error::LedgerError;
use super::status::{BookingStatus, PaymentStatus};
use super::store::{LedgerStore, PaymentStateUpdate};
use super::types::{Booking, PaymentAttempt};

#[derive(Default)]
struct Inner {
    bookings: HashMap<i64, Booking>,
    attempts: HashMap<String, PaymentAttempt>,
    applied_events: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a booking (stands in for the external booking-creation path)
    pub async fn insert_booking(&self, booking: Booking) {
        self.inner
            .write()
            .await
            .bookings
            .insert(booking.booking_id, booking);
    }

    /// Seed a payment attempt (stands in for the payment-initiation path)
    pub async fn insert_attempt(&self, attempt: PaymentAttempt) {
        self.inner
            .write()
            .await
            .attempts
            .insert(attempt.tx_id.clone(), attempt);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn fetch_booking(&self, booking_id: i64) -> Result<Option<Booking>, LedgerError> {
        Ok(self.inner.read().await.bookings.get(&booking_id).cloned())
    }

    async fn update_payment_state_if(
        &self,
        booking_id: i64,
        expected: PaymentStatus,
        update: PaymentStateUpdate,
    ) -> Result<Option<Booking>, LedgerError> {
        let mut inner = self.inner.write().await;

        let Some(booking) = inner.bookings.get_mut(&booking_id) else {
            return Ok(None);
        };
        if booking.payment_status != expected {
            return Ok(None);
        }

        booking.payment_status = update.payment_status;
        if let Some(status) = update.booking_status {
            booking.booking_status = status;
        }
        if update.failure_reason.is_some() {
            booking.failure_reason = update.failure_reason;
        }
        if update.refunded_amount.is_some() {
            booking.refunded_amount = update.refunded_amount;
        }
        booking.updated_at = Utc::now();

        Ok(Some(booking.clone()))
    }

    async fn fetch_attempt(&self, tx_id: &str) -> Result<Option<PaymentAttempt>, LedgerError> {
        Ok(self.inner.read().await.attempts.get(tx_id).cloned())
    }

    async fn update_attempt_status_if(
        &self,
        tx_id: &str,
        expected: PaymentStatus,
        new: PaymentStatus,
    ) -> Result<bool, LedgerError> {
        let mut inner = self.inner.write().await;

        let Some(attempt) = inner.attempts.get_mut(tx_id) else {
            return Ok(false);
        };
        if attempt.status != expected {
            return Ok(false);
        }

        attempt.status = new;
        Ok(true)
    }

    async fn find_open_attempts(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, LedgerError> {
        let inner = self.inner.read().await;

        let mut open: Vec<PaymentAttempt> = inner
            .attempts
            .values()
            .filter(|a| a.status.is_open() && a.created_at < cutoff)
            .cloned()
            .collect();
        open.sort_by_key(|a| a.created_at);
        open.truncate(limit as usize);

        Ok(open)
    }

    async fn mark_event_applied(&self, token: &str) -> Result<bool, LedgerError> {
        Ok(self
            .inner
            .write()
            .await
            .applied_events
            .insert(token.to_string()))
    }

    async fn event_applied(&self, token: &str) -> Result<bool, LedgerError> {
        Ok(self.inner.read().await.applied_events.contains(token))
    }

    async fn find_bookings_needing_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, LedgerError> {
        let inner = self.inner.read().await;

        let mut due: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| {
                b.booking_status == BookingStatus::Confirmed
                    && !b.reminder_sent
                    && b.scheduled_at >= from
                    && b.scheduled_at < until
            })
            .cloned()
            .collect();
        due.sort_by_key(|b| b.scheduled_at);
        due.truncate(limit as usize);

        Ok(due)
    }

    async fn mark_reminder_sent(&self, booking_id: i64) -> Result<bool, LedgerError> {
        let mut inner = self.inner.write().await;

        let Some(booking) = inner.bookings.get_mut(&booking_id) else {
            return Ok(false);
        };
        if booking.reminder_sent {
            return Ok(false);
        }

        booking.reminder_sent = true;
        booking.updated_at = Utc::now();
        Ok(true)
    }
}

/// Test fixtures shared by this crate's unit and integration tests
#[cfg(test)]
pub mod fixtures {
    use super::*;
    use rust_decimal::Decimal;

    pub fn booking(booking_id: i64, owner_id: i64) -> Booking {
        let now = Utc::now();
        Booking {
            booking_id,
            owner_id,
            payment_status: PaymentStatus::Pending,
            booking_status: BookingStatus::Pending,
            total_price: Decimal::new(10000, 2), // 100.00
            currency: "BRL".to_string(),
            provider_tx_id: None,
            failure_reason: None,
            refunded_amount: None,
            scheduled_at: now + chrono::Duration::days(1),
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn attempt(tx_id: &str, booking_id: i64) -> PaymentAttempt {
        PaymentAttempt {
            tx_id: tx_id.to_string(),
            booking_id,
            amount: Decimal::new(10000, 2),
            currency: "BRL".to_string(),
            status: PaymentStatus::Pending,
            created_at: Utc::now() - chrono::Duration::minutes(10),
            expires_at: Some(Utc::now() + chrono::Duration::minutes(30)),
        }
    }
}
