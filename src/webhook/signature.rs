//! Webhook signature verification.
//!
//! The provider signs `"{timestamp}.{raw_body}"` with HMAC-SHA256 and
//! sends `t=<unix>,v1=<hex>` in the signature header. Verification must
//! run against the raw request body, before any JSON parsing.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("webhook secret not configured")]
    MissingSecret,

    #[error("invalid signature header: {0}")]
    InvalidHeader(String),

    #[error("signature timestamp outside tolerance: {0}")]
    TimestampTolerance(String),

    #[error("signature mismatch")]
    Mismatch,
}

pub fn verify(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_seconds: i64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    // Parse signature header: t=timestamp,v1=signature[,v1=signature2,...]
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => {
                timestamp = kv[1].parse().ok();
            }
            "v1" => {
                signatures.push(kv[1]);
            }
            _ => {} // Ignore unknown fields
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| SignatureError::InvalidHeader("missing timestamp".to_string()))?;

    if signatures.is_empty() {
        return Err(SignatureError::InvalidHeader(
            "no v1 signature found".to_string(),
        ));
    }

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SignatureError::InvalidHeader(format!("system time error: {}", e)))?
        .as_secs() as i64;

    let time_diff = (current_time - timestamp).abs();
    if time_diff > tolerance_seconds {
        return Err(SignatureError::TimestampTolerance(format!(
            "timestamp {} differs from current time {} by {}s (tolerance {}s)",
            timestamp, current_time, time_diff, tolerance_seconds
        )));
    }

    let expected = compute(payload, secret, timestamp);

    // Constant-time comparison against every provided signature
    let signature_valid = signatures.iter().any(|sig| {
        expected.as_bytes().len() == sig.as_bytes().len()
            && expected
                .as_bytes()
                .iter()
                .zip(sig.as_bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    });

    if !signature_valid {
        return Err(SignatureError::Mismatch);
    }

    debug!(timestamp, time_diff, "Webhook signature verified");
    Ok(())
}

/// Produce a `t=...,v1=...` header for a payload; the counterpart of
/// [`verify`], used by fixtures and local tooling.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!("t={},v1={}", timestamp, compute(payload, secret, timestamp))
}

fn compute(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let payload = br#"{"event_type":"payment.confirmed"}"#;
        let header = sign(payload, "whsec_test", now());

        assert!(verify(payload, &header, "whsec_test", 300).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(b"original", "whsec_test", now());

        assert!(matches!(
            verify(b"tampered", &header, "whsec_test", 300),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(b"payload", "whsec_a", now());

        assert!(matches!(
            verify(b"payload", &header, "whsec_b", 300),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = sign(b"payload", "whsec_test", now() - 3600);

        assert!(matches!(
            verify(b"payload", &header, "whsec_test", 300),
            Err(SignatureError::TimestampTolerance(_))
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(matches!(
            verify(b"payload", "garbage", "whsec_test", 300),
            Err(SignatureError::InvalidHeader(_))
        ));
        assert!(matches!(
            verify(b"payload", &format!("t={}", now()), "whsec_test", 300),
            Err(SignatureError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let header = sign(b"payload", "whsec_test", now());
        assert!(matches!(
            verify(b"payload", &header, "", 300),
            Err(SignatureError::MissingSecret)
        ));
    }
}
