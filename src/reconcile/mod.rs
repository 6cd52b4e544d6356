//! Reconciliation Engine.
//!
//! Periodically compares the ledger's view of in-flight payment attempts
//! against the provider's and corrects drift through the shared
//! settlement path. The run is safe to repeat indefinitely over the same
//! non-terminal set: transient failures are counted and self-heal on the
//! next tick instead of needing bespoke retry logic.


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReconcileConfig;
use crate::jobs::{JobCounts, JobError, RecurringJob};
use crate::ledger::{LedgerError, PaymentAttempt};
use crate::provider::{PaymentProviderClient, ProviderError};
use crate::settlement::{PaymentOutcome, Settler};

pub const JOB_NAME: &str = "payment-reconciliation";

#[derive(Error, Debug)]
enum ReconcileError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct ReconciliationEngine {
    settler: Settler,
    provider: Arc<dyn PaymentProviderClient>,
    grace: chrono::Duration,
    batch_limit: i64,
    interval: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        settler: Settler,
        provider: Arc<dyn PaymentProviderClient>,
        config: &ReconcileConfig,
    ) -> Self {
        Self {
            settler,
            provider,
            grace: chrono::Duration::seconds(config.grace_secs),
            batch_limit: config.batch_limit,
            interval: Duration::from_secs(config.interval_secs),
        }
    }

    /// One reconciliation pass over the open attempt set.
    pub async fn run_once(&self) -> Result<JobCounts, JobError> {
        let now = Utc::now();
        // Brand-new attempts get a grace period before the provider is
        // asked about them
        let cutoff = now - self.grace;

        let attempts = self
            .settler
            .ledger()
            .store()
            .find_open_attempts(cutoff, self.batch_limit)
            .await
            .map_err(|e| JobError::Failed(format!("open-attempt scan failed: {}", e)))?;

        let mut counts = JobCounts::default();
        for attempt in &attempts {
            match self.reconcile_attempt(attempt, now).await {
                Ok(true) => counts.reconciled += 1,
                Ok(false) => {
                    debug!(tx_id = %attempt.tx_id, "Attempt still in flight at provider");
                }
                Err(e) => {
                    // Counted and retried on the next scheduled run
                    warn!(
                        tx_id = %attempt.tx_id,
                        booking_id = attempt.booking_id,
                        error = %e,
                        "Failed to reconcile attempt"
                    );
                    counts.failed += 1;
                }
            }
        }

        info!(
            scanned = attempts.len(),
            reconciled = counts.reconciled,
            failed = counts.failed,
            "Reconciliation pass complete"
        );
        Ok(counts)
    }

    /// Returns true if the attempt reached a terminal state this pass.
    async fn reconcile_attempt(
        &self,
        attempt: &PaymentAttempt,
        now: DateTime<Utc>,
    ) -> Result<bool, ReconcileError> {
        // Timeout policy: a lapsed attempt is failed locally, no provider
        // round-trip required for that decision
        if attempt.is_expired(now) {
            self.settler
                .apply(
                    attempt.booking_id,
                    &attempt.tx_id,
                    &PaymentOutcome::Failed {
                        reason: "payment attempt expired".to_string(),
                    },
                )
                .await?;
            return Ok(true);
        }

        let status = self.provider.get_status(&attempt.tx_id).await?;

        match PaymentOutcome::from_provider(status, attempt.amount) {
            Some(outcome) => {
                self.settler
                    .apply(attempt.booking_id, &attempt.tx_id, &outcome)
                    .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RecurringJob for ReconciliationEngine {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<JobCounts, JobError> {
        self.run_once().await
    }
}
