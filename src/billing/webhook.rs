//! Payment-processor webhook signature verification.
//!
//! HMAC-SHA256 over `"{timestamp}.{payload}"` with constant-time comparison
//! and a timestamp window to reject replays. An invalid signature is
//! terminal: no retry, no side effect.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use super::dto::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Events older than this are rejected.
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Tolerance for timestamps from the future (clock skew).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Timestamp out of range")]
    StaleTimestamp,
    #[error("Invalid payload: {0}")]
    ParseError(String),
}

/// Parsed `stripe-signature` header: `t=<timestamp>,v1=<hex signature>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".into()))?;
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse()
                            .map_err(|_| WebhookError::ParseError("invalid timestamp".into()))?,
                    );
                }
                "v1" => {
                    v1_signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid signature hex".into())
                    })?);
                }
                // unknown scheme fields are ignored for forward compatibility
                _ => {}
            }
        }

        Ok(SignatureHeader {
            timestamp: timestamp
                .ok_or_else(|| WebhookError::ParseError("missing timestamp".into()))?,
            v1_signature: v1_signature
                .ok_or_else(|| WebhookError::ParseError("missing v1 signature".into()))?,
        })
    }
}

pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies the signature header against the raw payload and parses the
    /// event. Any failure here must be treated as terminal by the caller.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;
        self.validate_timestamp(header.timestamp)?;

        let expected = self.compute_signature(header.timestamp, payload);
        if !constant_time_compare(&expected, &header.v1_signature) {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    fn validate_timestamp(&self, timestamp: i64) -> Result<(), WebhookError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let age = now - timestamp;
        if age > MAX_EVENT_AGE_SECS || age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::StaleTimestamp);
        }
        Ok(())
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Vec<u8> {
        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(signed_payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    let signed_payload = format!("{}.{}", timestamp, payload);
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";

    const TEST_PAYLOAD: &str = r#"{
        "id": "evt_test123",
        "type": "checkout.session.completed",
        "data": { "object": {} }
    }"#;

    fn signed_header(secret: &str, payload: &str) -> String {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let signature = compute_test_signature(secret, timestamp, payload);
        format!("t={},v1={}", timestamp, signature)
    }

    #[test]
    fn parse_header_with_v1() {
        let signature = "a".repeat(64);
        let header = SignatureHeader::parse(&format!("t=1234567890,v1={}", signature)).unwrap();
        assert_eq!(header.timestamp, 1234567890);
        assert_eq!(header.v1_signature.len(), 32);
    }

    #[test]
    fn parse_header_ignores_unknown_fields() {
        let signature = "a".repeat(64);
        let header =
            SignatureHeader::parse(&format!("t=1234567890,v1={},v0=legacy0", signature));
        assert!(header.is_ok());
    }

    #[test]
    fn parse_header_missing_timestamp_fails() {
        let result = SignatureHeader::parse(&format!("v1={}", "a".repeat(64)));
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_missing_signature_fails() {
        let result = SignatureHeader::parse("t=1234567890");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_invalid_hex_fails() {
        let result = SignatureHeader::parse("t=1234567890,v1=not_hex");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn valid_signature_verifies_and_parses() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let header = signed_header(TEST_SECRET, TEST_PAYLOAD);
        let event = verifier
            .verify_and_parse(TEST_PAYLOAD.as_bytes(), &header)
            .unwrap();
        assert_eq!(event.id, "evt_test123");
        assert_eq!(event.event_type, "checkout.session.completed");
    }

    #[test]
    fn wrong_secret_fails() {
        let verifier = WebhookVerifier::new("wrong_secret");
        let header = signed_header(TEST_SECRET, TEST_PAYLOAD);
        let result = verifier.verify_and_parse(TEST_PAYLOAD.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn tampered_payload_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let header = signed_header(TEST_SECRET, TEST_PAYLOAD);
        let tampered = TEST_PAYLOAD.replace("evt_test123", "evt_forged");
        let result = verifier.verify_and_parse(tampered.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn stale_timestamp_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let timestamp = OffsetDateTime::now_utc().unix_timestamp() - 600;
        let signature = compute_test_signature(TEST_SECRET, timestamp, TEST_PAYLOAD);
        let header = format!("t={},v1={}", timestamp, signature);
        let result = verifier.verify_and_parse(TEST_PAYLOAD.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::StaleTimestamp)));
    }

    #[test]
    fn future_timestamp_beyond_skew_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let timestamp = OffsetDateTime::now_utc().unix_timestamp() + 120;
        let signature = compute_test_signature(TEST_SECRET, timestamp, TEST_PAYLOAD);
        let header = format!("t={},v1={}", timestamp, signature);
        let result = verifier.verify_and_parse(TEST_PAYLOAD.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::StaleTimestamp)));
    }

    #[test]
    fn invalid_json_fails_after_signature_check() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = "not valid json";
        let header = signed_header(TEST_SECRET, payload);
        let result = verifier.verify_and_parse(payload.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }
}
