//! HTTP payment provider client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{PaymentProviderClient, ProviderError, ProviderStatus};
use crate::config::ProviderConfig;

pub struct HttpProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct InitiateResponse {
    attempt_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: ProviderStatus,
}

impl HttpProviderClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn map_transport_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transient(e.to_string())
        }
    }
}

#[async_trait]
impl PaymentProviderClient for HttpProviderClient {
    async fn initiate_payment(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}/v1/payments", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "amount": amount,
                "currency": currency,
                "metadata": metadata,
            }))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if response.status().is_server_error() {
            return Err(ProviderError::Transient(format!(
                "provider returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(ProviderError::UnexpectedResponse(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: InitiateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        debug!(attempt_id = %body.attempt_id, "Payment attempt initiated");
        Ok(body.attempt_id)
    }

    async fn get_status(&self, attempt_id: &str) -> Result<ProviderStatus, ProviderError> {
        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, attempt_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(ProviderError::UnknownAttempt(attempt_id.to_string()));
            }
            status if status.is_server_error() => {
                return Err(ProviderError::Transient(format!(
                    "provider returned {}",
                    status
                )));
            }
            status if !status.is_success() => {
                return Err(ProviderError::UnexpectedResponse(format!(
                    "provider returned {}",
                    status
                )));
            }
            _ => {}
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        Ok(body.status)
    }
}
