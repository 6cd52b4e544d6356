//! Payment and booking status definitions.
//!
//! Status IDs are designed for PostgreSQL storage as SMALLINT.

use std::fmt;

/// Payment status of a booking (and of its payment attempts).
///
/// Terminal states: FAILED (-10), REFUNDED (20). PAID (10) still admits
/// the refund transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(i16)]
pub enum PaymentStatus {
    /// Awaiting provider confirmation
    Pending = 0,

    /// Provider confirmed the charge
    Paid = 10,

    /// Refund issued against a paid booking
    Refunded = 20,

    /// Terminal: charge failed or attempt expired
    Failed = -10,
}

impl PaymentStatus {
    /// True once no further transitions are possible
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    /// True while a payment attempt is still in flight
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Whether `target` is reachable from this state.
    ///
    /// Self-transitions are not listed here; the accessor treats them as
    /// idempotent no-op successes, not as transitions.
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }

    /// Get the numeric status ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL status ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PaymentStatus::Pending),
            10 => Some(PaymentStatus::Paid),
            20 => Some(PaymentStatus::Refunded),
            -10 => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Booking lifecycle status.
///
/// Invariant: a PAID payment status implies CONFIRMED, IN_PROGRESS or
/// COMPLETED here; the conditional update writes both columns together so
/// the pair can never be observed torn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(i16)]
pub enum BookingStatus {
    Pending = 0,
    Confirmed = 10,
    InProgress = 20,
    Completed = 30,
    Cancelled = -10,
}

impl BookingStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(BookingStatus::Pending),
            10 => Some(BookingStatus::Confirmed),
            20 => Some(BookingStatus::InProgress),
            30 => Some(BookingStatus::Completed),
            -10 => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// States a paid booking is allowed to be in
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::InProgress | BookingStatus::Completed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());

        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Paid.is_terminal());
    }

    #[test]
    fn test_transition_table() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));

        // A booking that was never paid cannot be refunded
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn test_status_id_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Refunded,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::from_id(status.id()), Some(status));
        }

        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::InProgress,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::from_id(status.id()), Some(status));
        }

        assert!(PaymentStatus::from_id(999).is_none());
        assert!(BookingStatus::from_id(-999).is_none());
    }

    #[test]
    fn test_paid_implies_active_booking() {
        assert!(BookingStatus::Confirmed.is_active());
        assert!(BookingStatus::InProgress.is_active());
        assert!(BookingStatus::Completed.is_active());
        assert!(!BookingStatus::Pending.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(PaymentStatus::Paid.to_string(), "PAID");
        assert_eq!(BookingStatus::InProgress.to_string(), "IN_PROGRESS");
    }
}
