//! Webhook Processor.
//!
//! Consumes asynchronous provider notifications and applies idempotent
//! state transitions through the shared settlement path. Per event the
//! state machine is unseen -> applying -> applied, or unseen -> applying
//! -> rejected for malformed/unverifiable input; duplicate delivery
//! short-circuits to applied without another ledger write.

pub mod event;
pub mod signature;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::{ProviderConfig, WebhookConfig};
use crate::ledger::LedgerError;
use crate::settlement::{Settlement, Settler};

pub use event::{EventType, PaymentEvent};

/// Result of processing one inbound event
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event applied, or recognized as an already-applied duplicate
    Applied,
    /// Unverifiable or malformed; the ledger was never touched
    Rejected(String),
    /// Transient failures exhausted the retry budget or the per-event
    /// deadline; the provider's own redelivery will retry
    ProcessingFailed,
}

/// Cumulative processor counters for the admin stats surface
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookStatsSnapshot {
    pub received: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub failed: u64,
}

#[derive(Default)]
struct WebhookStats {
    received: AtomicU64,
    applied: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

enum ApplyOutcome {
    Fresh,
    Duplicate,
}

enum ApplyFailure {
    Reject(String),
    Transient(String),
}

impl From<LedgerError> for ApplyFailure {
    fn from(e: LedgerError) -> Self {
        if e.is_transient() {
            ApplyFailure::Transient(e.to_string())
        } else {
            ApplyFailure::Reject(e.to_string())
        }
    }
}

pub struct WebhookProcessor {
    settler: Settler,
    secret: String,
    tolerance_secs: i64,
    deadline: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    stats: WebhookStats,
}

impl WebhookProcessor {
    pub fn new(settler: Settler, provider: &ProviderConfig, webhook: &WebhookConfig) -> Self {
        Self {
            settler,
            secret: provider.webhook_secret.clone(),
            tolerance_secs: provider.signature_tolerance_secs,
            deadline: Duration::from_secs(webhook.deadline_secs),
            max_attempts: webhook.max_attempts.max(1),
            backoff_base: Duration::from_millis(webhook.backoff_base_ms),
            stats: WebhookStats::default(),
        }
    }

    pub fn stats(&self) -> WebhookStatsSnapshot {
        WebhookStatsSnapshot {
            received: self.stats.received.load(Ordering::Relaxed),
            applied: self.stats.applied.load(Ordering::Relaxed),
            duplicates: self.stats.duplicates.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Process one raw delivery. `payload` must be the unmodified request
    /// body; the signature covers the exact bytes.
    pub async fn process(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> WebhookOutcome {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let Some(header) = signature_header else {
            return self.reject("missing signature header");
        };
        if let Err(e) = signature::verify(payload, header, &self.secret, self.tolerance_secs) {
            return self.reject(&e.to_string());
        }

        let event: PaymentEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => return self.reject(&format!("malformed payload: {}", e)),
        };

        match tokio::time::timeout(self.deadline, self.apply_with_retry(&event)).await {
            Ok(Ok(ApplyOutcome::Fresh)) => {
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                info!(
                    tx_id = %event.transaction_id,
                    event_type = %event.event_type,
                    "Webhook event applied"
                );
                WebhookOutcome::Applied
            }
            Ok(Ok(ApplyOutcome::Duplicate)) => {
                self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                info!(
                    tx_id = %event.transaction_id,
                    event_type = %event.event_type,
                    "Duplicate webhook delivery, already applied"
                );
                WebhookOutcome::Applied
            }
            Ok(Err(ApplyFailure::Reject(reason))) => self.reject(&reason),
            Ok(Err(ApplyFailure::Transient(reason))) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    tx_id = %event.transaction_id,
                    reason = %reason,
                    "Webhook processing failed after retries"
                );
                WebhookOutcome::ProcessingFailed
            }
            Err(_elapsed) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    tx_id = %event.transaction_id,
                    deadline_secs = self.deadline.as_secs(),
                    "Webhook processing exceeded per-event deadline"
                );
                WebhookOutcome::ProcessingFailed
            }
        }
    }

    fn reject(&self, reason: &str) -> WebhookOutcome {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(reason = %reason, "Rejecting webhook event");
        WebhookOutcome::Rejected(reason.to_string())
    }

    async fn apply_with_retry(&self, event: &PaymentEvent) -> Result<ApplyOutcome, ApplyFailure> {
        let mut backoff = self.backoff_base;

        for attempt in 1..=self.max_attempts {
            match self.apply_once(event).await {
                Ok(outcome) => return Ok(outcome),
                Err(ApplyFailure::Transient(reason)) if attempt < self.max_attempts => {
                    warn!(
                        tx_id = %event.transaction_id,
                        attempt,
                        reason = %reason,
                        "Transient failure applying webhook, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ApplyFailure::Transient("retry budget exhausted".to_string()))
    }

    async fn apply_once(&self, event: &PaymentEvent) -> Result<ApplyOutcome, ApplyFailure> {
        let store = self.settler.ledger().store();
        let token = event.idempotency_token();

        // Duplicate delivery is a no-op, not an error
        if store.event_applied(&token).await? {
            return Ok(ApplyOutcome::Duplicate);
        }

        // Events referencing a transaction we never initiated are
        // unverifiable and must not reach the ledger accessor
        let attempt = store
            .fetch_attempt(&event.transaction_id)
            .await?
            .ok_or_else(|| {
                ApplyFailure::Reject(format!(
                    "unknown transaction id: {}",
                    event.transaction_id
                ))
            })?;

        let outcome = event.outcome(attempt.amount);
        match self.settler.apply(attempt.booking_id, &event.transaction_id, &outcome).await? {
            Settlement::Applied(_) => {}
            Settlement::Anomaly => {
                // e.g. a refund webhook for an already-refunded booking;
                // logged in the settler, consumed here
            }
        }

        store.mark_event_applied(&token).await?;
        Ok(ApplyOutcome::Fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::time::{SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::cache::CacheStore;
    use crate::cache::memory::MemoryBackend;
    use crate::config::CacheConfig;
    use crate::ledger::memory::{MemoryLedgerStore, fixtures};
    use crate::ledger::{
        Booking, LedgerAccessor, LedgerStore, PaymentAttempt, PaymentStateUpdate, PaymentStatus,
    };

    fn signed(payload: &[u8]) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        signature::sign(payload, "whsec_test", now)
    }

    fn confirmed_payload(tx_id: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event_type": "payment.confirmed",
            "transaction_id": tx_id,
            "amount": "100.00",
            "currency": "BRL",
            "occurred_at": Utc::now(),
        }))
        .unwrap()
    }

    fn processor_over(store: Arc<dyn LedgerStore>) -> WebhookProcessor {
        let cache = Arc::new(CacheStore::new(
            Arc::new(MemoryBackend::new()),
            &CacheConfig::default(),
        ));
        let settler = Settler::new(LedgerAccessor::new(store), cache);

        let provider = ProviderConfig {
            webhook_secret: "whsec_test".to_string(),
            ..ProviderConfig::default()
        };
        let webhook = WebhookConfig {
            deadline_secs: 5,
            max_attempts: 3,
            backoff_base_ms: 1,
        };
        WebhookProcessor::new(settler, &provider, &webhook)
    }

    async fn seeded_store() -> Arc<MemoryLedgerStore> {
        let store = Arc::new(MemoryLedgerStore::new());
        store.insert_booking(fixtures::booking(1, 10)).await;
        store.insert_attempt(fixtures::attempt("tx-1", 1)).await;
        store
    }

    #[tokio::test]
    async fn test_confirmed_event_applied() {
        let store = seeded_store().await;
        let processor = processor_over(store.clone());

        let payload = confirmed_payload("tx-1");
        let outcome = processor.process(&payload, Some(&signed(&payload))).await;

        assert_eq!(outcome, WebhookOutcome::Applied);
        let booking = store.fetch_booking(1).await.unwrap().unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
        assert_eq!(processor.stats().applied, 1);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_no_second_write() {
        let store = seeded_store().await;
        let processor = processor_over(store.clone());
        let payload = confirmed_payload("tx-1");

        assert_eq!(
            processor.process(&payload, Some(&signed(&payload))).await,
            WebhookOutcome::Applied
        );
        let updated_at_after_first = store.fetch_booking(1).await.unwrap().unwrap().updated_at;

        // Second delivery of the same event: applied, no ledger write
        assert_eq!(
            processor.process(&payload, Some(&signed(&payload))).await,
            WebhookOutcome::Applied
        );
        let updated_at_after_second = store.fetch_booking(1).await.unwrap().unwrap().updated_at;

        assert_eq!(updated_at_after_first, updated_at_after_second);
        assert_eq!(processor.stats().duplicates, 1);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let store = seeded_store().await;
        let processor = processor_over(store.clone());
        let payload = confirmed_payload("tx-1");

        let outcome = processor
            .process(&payload, Some("t=1,v1=deadbeef"))
            .await;
        assert!(matches!(outcome, WebhookOutcome::Rejected(_)));

        let outcome = processor.process(&payload, None).await;
        assert!(matches!(outcome, WebhookOutcome::Rejected(_)));

        // Ledger untouched
        let booking = store.fetch_booking(1).await.unwrap().unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(processor.stats().rejected, 2);
    }

    #[tokio::test]
    async fn test_unknown_transaction_rejected() {
        let store = seeded_store().await;
        let processor = processor_over(store);

        let payload = confirmed_payload("tx-unknown");
        let outcome = processor.process(&payload, Some(&signed(&payload))).await;

        assert!(matches!(outcome, WebhookOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_refund_for_unpaid_booking_is_logged_anomaly_not_error() {
        let store = seeded_store().await;
        let processor = processor_over(store.clone());

        let payload = serde_json::to_vec(&serde_json::json!({
            "event_type": "payment.refunded",
            "transaction_id": "tx-1",
            "amount": "100.00",
            "occurred_at": Utc::now(),
        }))
        .unwrap();

        // InvalidTransition is not retried and does not fail processing
        let outcome = processor.process(&payload, Some(&signed(&payload))).await;
        assert_eq!(outcome, WebhookOutcome::Applied);

        let booking = store.fetch_booking(1).await.unwrap().unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
    }

    /// Delegating store that fails the first N attempt lookups with a
    /// transient storage error
    struct FlakyStore {
        inner: Arc<MemoryLedgerStore>,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl LedgerStore for FlakyStore {
        async fn fetch_booking(&self, booking_id: i64) -> Result<Option<Booking>, LedgerError> {
            self.inner.fetch_booking(booking_id).await
        }

        async fn update_payment_state_if(
            &self,
            booking_id: i64,
            expected: PaymentStatus,
            update: PaymentStateUpdate,
        ) -> Result<Option<Booking>, LedgerError> {
            self.inner
                .update_payment_state_if(booking_id, expected, update)
                .await
        }

        async fn fetch_attempt(
            &self,
            tx_id: &str,
        ) -> Result<Option<PaymentAttempt>, LedgerError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(LedgerError::Storage(sqlx::Error::PoolTimedOut));
            }
            self.inner.fetch_attempt(tx_id).await
        }

        async fn update_attempt_status_if(
            &self,
            tx_id: &str,
            expected: PaymentStatus,
            new: PaymentStatus,
        ) -> Result<bool, LedgerError> {
            self.inner.update_attempt_status_if(tx_id, expected, new).await
        }

        async fn find_open_attempts(
            &self,
            cutoff: DateTime<Utc>,
            limit: i64,
        ) -> Result<Vec<PaymentAttempt>, LedgerError> {
            self.inner.find_open_attempts(cutoff, limit).await
        }

        async fn mark_event_applied(&self, token: &str) -> Result<bool, LedgerError> {
            self.inner.mark_event_applied(token).await
        }

        async fn event_applied(&self, token: &str) -> Result<bool, LedgerError> {
            self.inner.event_applied(token).await
        }

        async fn find_bookings_needing_reminder(
            &self,
            from: DateTime<Utc>,
            until: DateTime<Utc>,
            limit: i64,
        ) -> Result<Vec<Booking>, LedgerError> {
            self.inner
                .find_bookings_needing_reminder(from, until, limit)
                .await
        }

        async fn mark_reminder_sent(&self, booking_id: i64) -> Result<bool, LedgerError> {
            self.inner.mark_reminder_sent(booking_id).await
        }
    }

    #[tokio::test]
    async fn test_transient_ledger_failure_retried_then_applied() {
        let inner = seeded_store().await;
        let flaky = Arc::new(FlakyStore {
            inner: inner.clone(),
            failures_left: AtomicU32::new(2),
        });
        let processor = processor_over(flaky);

        let payload = confirmed_payload("tx-1");
        let outcome = processor.process(&payload, Some(&signed(&payload))).await;

        assert_eq!(outcome, WebhookOutcome::Applied);
        let booking = inner.fetch_booking(1).await.unwrap().unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_processing() {
        let inner = seeded_store().await;
        let flaky = Arc::new(FlakyStore {
            inner,
            failures_left: AtomicU32::new(10),
        });
        let processor = processor_over(flaky);

        let payload = confirmed_payload("tx-1");
        let outcome = processor.process(&payload, Some(&signed(&payload))).await;

        assert_eq!(outcome, WebhookOutcome::ProcessingFailed);
        assert_eq!(processor.stats().failed, 1);
    }
}
