use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Webhook event, reduced to the fields this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Checkout-session object carried in a `checkout.session.completed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub customer: Option<String>,
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

/// Metadata we attach when creating the session. `user_id` is the stable
/// opaque reference used to locate the user on completion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutMetadata {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BillingStatusResponse {
    pub plan: &'static str,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub subscription_end_date: Option<OffsetDateTime>,
    pub subscription_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_session_deserializes_with_metadata() {
        let raw = serde_json::json!({
            "customer": "cus_123",
            "subscription": "sub_456",
            "customer_email": "a@x.com",
            "metadata": { "user_id": "7f8d3a50-0000-0000-0000-000000000000" }
        });
        let session: CheckoutSessionObject = serde_json::from_value(raw).unwrap();
        assert_eq!(session.customer.as_deref(), Some("cus_123"));
        assert_eq!(
            session.metadata.user_id.as_deref(),
            Some("7f8d3a50-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn checkout_session_tolerates_missing_metadata() {
        let raw = serde_json::json!({
            "customer": null,
            "subscription": null,
            "customer_email": null
        });
        let session: CheckoutSessionObject = serde_json::from_value(raw).unwrap();
        assert!(session.metadata.user_id.is_none());
    }

    #[test]
    fn billing_status_serializes_rfc3339_expiry() {
        let end = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let status = BillingStatusResponse {
            plan: "Pro",
            is_active: true,
            subscription_end_date: Some(end),
            subscription_id: Some("sub_456".into()),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"plan\":\"Pro\""));
        assert!(json.contains("2023-11-14T"));
    }
}
