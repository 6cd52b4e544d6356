//! Reminder dispatch job.
//!
//! Scans confirmed bookings starting inside the lookahead window and
//! hands each to a [`ReminderSink`]. Message content and delivery
//! transport live outside this core; the sink is the seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::{JobCounts, JobError, RecurringJob};
use crate::config::ReminderConfig;
use crate::ledger::{Booking, LedgerStore};

const SCAN_LIMIT: i64 = 500;

#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn deliver(&self, booking: &Booking) -> Result<(), String>;
}

/// Default sink: records the reminder in the service log
pub struct LogReminderSink;

#[async_trait]
impl ReminderSink for LogReminderSink {
    async fn deliver(&self, booking: &Booking) -> Result<(), String> {
        info!(
            booking_id = booking.booking_id,
            owner_id = booking.owner_id,
            scheduled_at = %booking.scheduled_at,
            "Reminder due for booking"
        );
        Ok(())
    }
}

pub struct ReminderJob {
    store: Arc<dyn LedgerStore>,
    sink: Arc<dyn ReminderSink>,
    lookahead: chrono::Duration,
    interval: Duration,
}

impl ReminderJob {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        sink: Arc<dyn ReminderSink>,
        config: &ReminderConfig,
    ) -> Self {
        Self {
            store,
            sink,
            lookahead: chrono::Duration::seconds(config.lookahead_secs),
            interval: Duration::from_secs(config.interval_secs),
        }
    }
}

#[async_trait]
impl RecurringJob for ReminderJob {
    fn name(&self) -> &'static str {
        "booking-reminders"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<JobCounts, JobError> {
        let now = Utc::now();
        let due = self
            .store
            .find_bookings_needing_reminder(now, now + self.lookahead, SCAN_LIMIT)
            .await
            .map_err(|e| JobError::Failed(e.to_string()))?;

        let mut counts = JobCounts::default();
        for booking in due {
            // Claim before delivering so concurrent platform instances
            // never double-remind; a failed delivery is counted and the
            // booking stays claimed (reminders are best-effort)
            match self.store.mark_reminder_sent(booking.booking_id).await {
                Ok(true) => match self.sink.deliver(&booking).await {
                    Ok(()) => counts.reconciled += 1,
                    Err(e) => {
                        warn!(
                            booking_id = booking.booking_id,
                            error = %e,
                            "Reminder delivery failed"
                        );
                        counts.failed += 1;
                    }
                },
                Ok(false) => {} // Another instance claimed it
                Err(e) => {
                    warn!(
                        booking_id = booking.booking_id,
                        error = %e,
                        "Failed to claim reminder"
                    );
                    counts.failed += 1;
                }
            }
        }

        Ok(counts)
    }
}
