//! Payment Ledger
//!
//! The authoritative booking/payment record store. Every payment-state
//! mutation in the system goes through [`LedgerAccessor`], which applies
//! atomic conditional updates so concurrent writers applying the same
//! transition are idempotent instead of racing.

pub mod accessor;
pub mod error;
pub mod memory;
pub mod pg;
pub mod status;
pub mod store;
pub mod types;

pub use accessor::LedgerAccessor;
pub use error::LedgerError;
pub use memory::MemoryLedgerStore;
pub use pg::PgLedgerStore;
pub use status::{BookingStatus, PaymentStatus};
pub use store::{LedgerStore, PaymentStateUpdate};
pub use types::{Booking, PaymentAttempt, PaymentStateView};
