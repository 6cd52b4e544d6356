//! Faxina Core - Booking Payment Reconciliation
//!
//! The background-job and payment-reconciliation core of the Faxina
//! cleaning-service booking platform.
//!
//! # Modules
//!
//! - [`ledger`] - Authoritative booking/payment store with conditional updates
//! - [`cache`] - Best-effort TTL cache fronting read-heavy entities
//! - [`provider`] - Abstract payment provider client (HTTP + mock)
//! - [`settlement`] - The single shared apply-outcome-and-invalidate path
//! - [`webhook`] - Provider event verification and idempotent application
//! - [`reconcile`] - Periodic ledger-vs-provider drift correction
//! - [`jobs`] - Scheduler, run records and stats
//! - [`gateway`] - Admin HTTP surface and webhook ingress
//! - [`config`] / [`logging`] / [`db`] - Service plumbing

pub mod cache;
pub mod config;
pub mod db;
pub mod gateway;
pub mod jobs;
pub mod ledger;
pub mod logging;
pub mod provider;
pub mod reconcile;
pub mod settlement;
pub mod webhook;

// Convenient re-exports at crate root
pub use cache::{CacheBackend, CacheStore};
pub use config::AppConfig;
pub use db::Database;
pub use jobs::{JobCounts, JobRunRecord, JobScheduler, RecurringJob, RunOutcome, TriggerOutcome};
pub use ledger::{
    Booking, BookingStatus, LedgerAccessor, LedgerError, LedgerStore, MemoryLedgerStore,
    PaymentAttempt, PaymentStatus, PgLedgerStore,
};
pub use provider::{
    HttpProviderClient, MockProviderClient, PaymentProviderClient, ProviderError, ProviderStatus,
};
pub use reconcile::ReconciliationEngine;
pub use settlement::{PaymentOutcome, Settlement, Settler};
pub use webhook::{PaymentEvent, WebhookOutcome, WebhookProcessor};
