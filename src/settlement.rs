//! Shared payment-settlement path.
//!
//! The Webhook Processor and the Reconciliation Engine both reduce their
//! input to a [`PaymentOutcome`] and hand it to the [`Settler`]; whichever
//! arrives first wins the ledger's conditional update and the other is a
//! no-op success. Cache invalidation happens synchronously in the same
//! call path as the triggering ledger write, never deferred.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::cache::{CacheStore, keys};
use crate::ledger::{Booking, LedgerAccessor, LedgerError, PaymentStatus};
use crate::provider::ProviderStatus;

/// Normalized terminal outcome of a payment attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Confirmed,
    Failed { reason: String },
    Refunded { amount: Decimal },
}

impl PaymentOutcome {
    /// Map a provider-reported status to an outcome; `None` while the
    /// attempt is still in flight. Refunds observed by polling are taken
    /// at the attempt's full amount.
    pub fn from_provider(status: ProviderStatus, attempt_amount: Decimal) -> Option<Self> {
        match status {
            ProviderStatus::Pending => None,
            ProviderStatus::Confirmed => Some(PaymentOutcome::Confirmed),
            ProviderStatus::Failed => Some(PaymentOutcome::Failed {
                reason: "provider reported failure".to_string(),
            }),
            ProviderStatus::Expired => Some(PaymentOutcome::Failed {
                reason: "expired by provider".to_string(),
            }),
            ProviderStatus::Refunded => Some(PaymentOutcome::Refunded {
                amount: attempt_amount,
            }),
        }
    }

    fn attempt_transition(&self) -> (PaymentStatus, PaymentStatus) {
        match self {
            PaymentOutcome::Confirmed => (PaymentStatus::Pending, PaymentStatus::Paid),
            PaymentOutcome::Failed { .. } => (PaymentStatus::Pending, PaymentStatus::Failed),
            PaymentOutcome::Refunded { .. } => (PaymentStatus::Paid, PaymentStatus::Refunded),
        }
    }
}

/// What applying an outcome did
#[derive(Debug)]
pub enum Settlement {
    /// Ledger reflects the outcome (this caller won, or a concurrent
    /// caller already applied the same transition)
    Applied(Booking),
    /// State machine disagreed (e.g. refund of a never-paid booking);
    /// logged as an anomaly and never retried
    Anomaly,
}

#[derive(Clone)]
pub struct Settler {
    ledger: LedgerAccessor,
    cache: Arc<CacheStore>,
}

impl Settler {
    pub fn new(ledger: LedgerAccessor, cache: Arc<CacheStore>) -> Self {
        Self { ledger, cache }
    }

    pub fn ledger(&self) -> &LedgerAccessor {
        &self.ledger
    }

    /// Apply a terminal outcome to the booking and its attempt, then
    /// invalidate the cache entries the booking's owner reads through.
    pub async fn apply(
        &self,
        booking_id: i64,
        tx_id: &str,
        outcome: &PaymentOutcome,
    ) -> Result<Settlement, LedgerError> {
        let result = match outcome {
            PaymentOutcome::Confirmed => self.ledger.mark_paid(booking_id).await,
            PaymentOutcome::Failed { reason } => self.ledger.mark_failed(booking_id, reason).await,
            PaymentOutcome::Refunded { amount } => {
                self.ledger.mark_refunded(booking_id, *amount).await
            }
        };

        let booking = match result {
            Ok(booking) => booking,
            Err(
                e @ (LedgerError::InvalidTransition { .. } | LedgerError::InvalidRefundAmount { .. }),
            ) => {
                // Out-of-order or duplicate provider report; the event is
                // consumed, the attempt still leaves the open set
                warn!(booking_id, tx_id, error = %e, "Ignoring out-of-order payment outcome");
                self.finalize_attempt(tx_id, outcome).await?;
                return Ok(Settlement::Anomaly);
            }
            Err(e) => return Err(e),
        };

        self.finalize_attempt(tx_id, outcome).await?;
        self.invalidate_for(&booking).await;

        Ok(Settlement::Applied(booking))
    }

    async fn finalize_attempt(
        &self,
        tx_id: &str,
        outcome: &PaymentOutcome,
    ) -> Result<(), LedgerError> {
        let (expected, new) = outcome.attempt_transition();
        let won = self
            .ledger
            .store()
            .update_attempt_status_if(tx_id, expected, new)
            .await?;
        if !won {
            debug!(tx_id, status = %new, "Attempt already finalized");
        }
        Ok(())
    }

    async fn invalidate_for(&self, booking: &Booking) {
        self.cache
            .delete(&keys::user_bookings(booking.owner_id))
            .await;
        self.cache.delete(&keys::admin_bookings()).await;
    }
}
