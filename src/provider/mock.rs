//! Mock provider client for tests and local wiring.
//!
//! Statuses are scripted per attempt id; failures can be injected to
//! exercise the transient-error paths. Call counters let tests assert
//! which attempts were (or were not) polled.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{PaymentProviderClient, ProviderError, ProviderStatus};

#[derive(Default)]
pub struct MockProviderClient {
    statuses: Mutex<HashMap<String, ProviderStatus>>,
    fail_get_status: AtomicBool,
    initiate_calls: AtomicU64,
    status_calls: AtomicU64,
}

impl MockProviderClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status the provider reports for an attempt
    pub fn set_status(&self, attempt_id: &str, status: ProviderStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(attempt_id.to_string(), status);
    }

    /// Make every `get_status` call fail with a transient error
    pub fn set_fail_get_status(&self, fail: bool) {
        self.fail_get_status.store(fail, Ordering::SeqCst);
    }

    pub fn initiate_count(&self) -> u64 {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn status_call_count(&self) -> u64 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProviderClient for MockProviderClient {
    async fn initiate_payment(
        &self,
        _amount: Decimal,
        _currency: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<String, ProviderError> {
        let n = self.initiate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let attempt_id = format!("mock-tx-{}", n);
        self.set_status(&attempt_id, ProviderStatus::Pending);
        Ok(attempt_id)
    }

    async fn get_status(&self, attempt_id: &str) -> Result<ProviderStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_get_status.load(Ordering::SeqCst) {
            return Err(ProviderError::Transient("mock provider down".to_string()));
        }

        self.statuses
            .lock()
            .unwrap()
            .get(attempt_id)
            .copied()
            .ok_or_else(|| ProviderError::UnknownAttempt(attempt_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_status() {
        let mock = MockProviderClient::new();
        mock.set_status("tx-1", ProviderStatus::Confirmed);

        assert_eq!(mock.get_status("tx-1").await.unwrap(), ProviderStatus::Confirmed);
        assert!(matches!(
            mock.get_status("tx-unknown").await.unwrap_err(),
            ProviderError::UnknownAttempt(_)
        ));
        assert_eq!(mock.status_call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mock = MockProviderClient::new();
        mock.set_status("tx-1", ProviderStatus::Confirmed);
        mock.set_fail_get_status(true);

        assert!(mock.get_status("tx-1").await.unwrap_err().is_transient());

        mock.set_fail_get_status(false);
        assert!(mock.get_status("tx-1").await.is_ok());
    }
}
