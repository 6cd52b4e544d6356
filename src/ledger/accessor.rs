//! Payment Ledger Accessor.
//!
//! Sole writer of authoritative payment state. Every mutation is one
//! conditional update; when the guard misses because a concurrent caller
//! already applied the same transition, the second caller observes the
//! already-updated record and reports success. This is what makes the
//! webhook and reconciliation paths safe under duplicate delivery and
//! true parallelism.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use super::error::LedgerError;
use super::status::PaymentStatus;
use super::store::{LedgerStore, PaymentStateUpdate};
use super::types::{Booking, PaymentStateView};

#[derive(Clone)]
pub struct LedgerAccessor {
    store: Arc<dyn LedgerStore>,
}

impl LedgerAccessor {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// PENDING -> PAID; the booking is confirmed in the same write.
    pub async fn mark_paid(&self, booking_id: i64) -> Result<Booking, LedgerError> {
        let booking = self
            .transition(booking_id, PaymentStatus::Pending, PaymentStateUpdate::paid())
            .await?;
        info!(booking_id, owner_id = booking.owner_id, "Booking marked paid");
        Ok(booking)
    }

    /// PENDING -> FAILED. The booking itself stays pending so the
    /// customer can retry with a fresh attempt.
    pub async fn mark_failed(
        &self,
        booking_id: i64,
        reason: &str,
    ) -> Result<Booking, LedgerError> {
        let booking = self
            .transition(
                booking_id,
                PaymentStatus::Pending,
                PaymentStateUpdate::failed(reason),
            )
            .await?;
        info!(booking_id, reason, "Booking payment marked failed");
        Ok(booking)
    }

    /// PAID -> REFUNDED; cancels the booking in the same write.
    pub async fn mark_refunded(
        &self,
        booking_id: i64,
        amount: Decimal,
    ) -> Result<Booking, LedgerError> {
        let current = self
            .store
            .fetch_booking(booking_id)
            .await?
            .ok_or(LedgerError::NotFound(booking_id))?;

        if amount <= Decimal::ZERO || amount > current.total_price {
            return Err(LedgerError::InvalidRefundAmount {
                booking_id,
                amount,
                total: current.total_price,
            });
        }

        let booking = self
            .transition(
                booking_id,
                PaymentStatus::Paid,
                PaymentStateUpdate::refunded(amount),
            )
            .await?;
        info!(booking_id, %amount, "Booking refunded");
        Ok(booking)
    }

    pub async fn get_payment_state(
        &self,
        booking_id: i64,
    ) -> Result<PaymentStateView, LedgerError> {
        let booking = self
            .store
            .fetch_booking(booking_id)
            .await?
            .ok_or(LedgerError::NotFound(booking_id))?;
        Ok(PaymentStateView::from(&booking))
    }

    async fn transition(
        &self,
        booking_id: i64,
        expected: PaymentStatus,
        update: PaymentStateUpdate,
    ) -> Result<Booking, LedgerError> {
        let target = update.payment_status;

        if let Some(booking) = self
            .store
            .update_payment_state_if(booking_id, expected, update)
            .await?
        {
            return Ok(booking);
        }

        // Guard miss: either the booking is gone, a concurrent caller
        // already applied this transition, or the transition is invalid.
        let current = self
            .store
            .fetch_booking(booking_id)
            .await?
            .ok_or(LedgerError::NotFound(booking_id))?;

        if current.payment_status == target {
            debug!(
                booking_id,
                status = %target,
                "No rows changed; transition already applied, treating as success"
            );
            return Ok(current);
        }

        Err(LedgerError::InvalidTransition {
            booking_id,
            from: current.payment_status,
            to: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::{MemoryLedgerStore, fixtures};
    use crate::ledger::status::BookingStatus;

    async fn accessor_with(bookings: Vec<Booking>) -> (LedgerAccessor, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        for booking in bookings {
            store.insert_booking(booking).await;
        }
        (LedgerAccessor::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_mark_paid_confirms_booking() {
        let (accessor, _) = accessor_with(vec![fixtures::booking(1, 10)]).await;

        let booking = accessor.mark_paid(1).await.unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
        assert_eq!(booking.booking_status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_mark_paid_twice_is_idempotent() {
        let (accessor, store) = accessor_with(vec![fixtures::booking(1, 10)]).await;

        let first = accessor.mark_paid(1).await.unwrap();
        let first_updated_at = store
            .fetch_booking(1)
            .await
            .unwrap()
            .unwrap()
            .updated_at;

        // Duplicate webhook delivery: second call succeeds without writing
        let second = accessor.mark_paid(1).await.unwrap();
        let second_updated_at = store
            .fetch_booking(1)
            .await
            .unwrap()
            .unwrap()
            .updated_at;

        assert_eq!(first.payment_status, PaymentStatus::Paid);
        assert_eq!(second.payment_status, PaymentStatus::Paid);
        assert_eq!(first_updated_at, second_updated_at);
    }

    #[tokio::test]
    async fn test_concurrent_mark_paid_single_state_change() {
        let (accessor, _) = accessor_with(vec![fixtures::booking(1, 10)]).await;

        let a = accessor.clone();
        let b = accessor.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.mark_paid(1).await }),
            tokio::spawn(async move { b.mark_paid(1).await }),
        );

        // Both callers succeed; the loser of the race sees a no-op
        assert!(ra.unwrap().is_ok());
        assert!(rb.unwrap().is_ok());

        let state = accessor.get_payment_state(1).await.unwrap();
        assert_eq!(state.payment_status, PaymentStatus::Paid);
        assert_eq!(state.booking_status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_refund_of_unpaid_booking_rejected() {
        let (accessor, store) = accessor_with(vec![fixtures::booking(1, 10)]).await;

        let err = accessor
            .mark_refunded(1, Decimal::new(10000, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));

        // State must be left untouched
        let booking = store.fetch_booking(1).await.unwrap().unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert!(booking.refunded_amount.is_none());
    }

    #[tokio::test]
    async fn test_refund_amount_bounds() {
        let (accessor, _) = accessor_with(vec![fixtures::booking(1, 10)]).await;
        accessor.mark_paid(1).await.unwrap();

        let err = accessor
            .mark_refunded(1, Decimal::new(99999, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRefundAmount { .. }));

        let booking = accessor
            .mark_refunded(1, Decimal::new(10000, 2))
            .await
            .unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Refunded);
        assert_eq!(booking.booking_status, BookingStatus::Cancelled);
        assert_eq!(booking.refunded_amount, Some(Decimal::new(10000, 2)));
    }

    #[tokio::test]
    async fn test_mark_failed_keeps_booking_pending() {
        let (accessor, _) = accessor_with(vec![fixtures::booking(1, 10)]).await;

        let booking = accessor.mark_failed(1, "qr code expired").await.unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Failed);
        assert_eq!(booking.booking_status, BookingStatus::Pending);
        assert_eq!(booking.failure_reason.as_deref(), Some("qr code expired"));
    }

    #[tokio::test]
    async fn test_missing_booking_not_found() {
        let (accessor, _) = accessor_with(vec![]).await;

        assert!(matches!(
            accessor.mark_paid(404).await.unwrap_err(),
            LedgerError::NotFound(404)
        ));
        assert!(matches!(
            accessor.get_payment_state(404).await.unwrap_err(),
            LedgerError::NotFound(404)
        ));
    }
}
